//! Dispatch through the send and handle stages.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use messenger_rust::{
    BusError, Envelope, HandledStamp, HandlerError, HandlersLocator, InMemoryTransport, Message,
    MessageBus, RetryCount, SendersLocator, SentStamp, SerializationError, Serializer, Stamp,
    TransportError, TransportLocator,
};
use serde::{Deserialize, Serialize};

use crate::support::{hello, DownTransport, Hello, PlaceOrder, RecordingTransport};

#[test]
fn routed_message_is_sent_to_every_transport_in_order_and_not_handled() {
    let first = RecordingTransport::new();
    let second = RecordingTransport::new();
    let handled = Arc::new(Mutex::new(0));
    let counter = handled.clone();

    let bus = MessageBus::builder()
        .senders(SendersLocator::new().route::<Hello, _, _>(["first", "second"]))
        .transports(
            TransportLocator::new()
                .with("first", Arc::new(first.clone()))
                .with("second", Arc::new(second.clone())),
        )
        .handlers(HandlersLocator::new().handler(move |_: &Hello| {
            *counter.lock().unwrap() += 1;
            Ok(())
        }))
        .build()
        .unwrap();

    let envelope = bus.dispatch(hello("Ada")).unwrap();

    assert_eq!(first.sends(), 1);
    assert_eq!(second.sends(), 1);
    assert_eq!(*handled.lock().unwrap(), 0);

    let sent_to: Vec<_> = envelope
        .all::<SentStamp>()
        .iter()
        .map(|stamp| stamp.transport.as_str())
        .collect();
    assert_eq!(sent_to, vec!["first", "second"]);
}

#[test]
fn routed_message_without_handlers_only_sends() {
    let amqp = RecordingTransport::new();
    let bus = MessageBus::builder()
        .senders(SendersLocator::new().route::<Hello, _, _>(["amqp"]))
        .transports(TransportLocator::new().with("amqp", Arc::new(amqp.clone())))
        .build()
        .unwrap();

    bus.dispatch(hello("Ada")).unwrap();

    assert_eq!(amqp.sends(), 1);
    assert_eq!(amqp.acks(), 0);
}

#[test]
fn handlers_run_in_order_and_stop_at_first_failure() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (a, b, c) = (log.clone(), log.clone(), log.clone());

    let bus = MessageBus::builder()
        .handlers(
            HandlersLocator::new()
                .named_handler("first", move |_: &PlaceOrder| {
                    a.lock().unwrap().push("first");
                    Ok(())
                })
                .named_handler("second", move |_: &PlaceOrder| {
                    b.lock().unwrap().push("second");
                    Err(HandlerError::Rejected("out of stock".into()))
                })
                .named_handler("third", move |_: &PlaceOrder| {
                    c.lock().unwrap().push("third");
                    Ok(())
                }),
        )
        .build()
        .unwrap();

    let err = bus
        .dispatch(PlaceOrder {
            order_id: "o-1".into(),
            total_cents: 1999,
        })
        .unwrap_err();

    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    assert!(matches!(
        err,
        BusError::Handler { ref handler, ref message_type, .. }
            if handler == "second" && message_type == "shop.place_order"
    ));
    assert!(err.is_retryable());
}

#[test]
fn every_handler_runs_once_on_success() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (a, b) = (log.clone(), log.clone());

    let bus = MessageBus::builder()
        .handlers(
            HandlersLocator::new()
                .named_handler("greet", move |msg: &Hello| {
                    a.lock().unwrap().push(format!("greet {}", msg.name));
                    Ok(())
                })
                .named_handler("audit", move |msg: &Hello| {
                    b.lock().unwrap().push(format!("audit {}", msg.name));
                    Ok(())
                }),
        )
        .build()
        .unwrap();

    let envelope = bus.dispatch(hello("Ada")).unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["greet Ada", "audit Ada"]);
    let handled: Vec<_> = envelope
        .all::<HandledStamp>()
        .iter()
        .map(|stamp| stamp.handler.as_str())
        .collect();
    assert_eq!(handled, vec!["greet", "audit"]);
}

#[test]
fn unrouted_message_without_handlers_fails() {
    let bus = MessageBus::builder()
        .handlers(HandlersLocator::new().handler(|_: &Hello| Ok(())))
        .build()
        .unwrap();

    let err = bus
        .dispatch(PlaceOrder {
            order_id: "o-2".into(),
            total_cents: 0,
        })
        .unwrap_err();

    assert!(matches!(err, BusError::NoHandler { ref message_type } if message_type == "shop.place_order"));
    assert!(!err.is_retryable());
}

#[test]
fn envelope_and_raw_message_dispatch_alike() {
    let bus = MessageBus::builder()
        .handlers(HandlersLocator::new().named_handler("greet", |_: &Hello| Ok(())))
        .build()
        .unwrap();

    let names = |envelope: &Envelope| -> Vec<&'static str> {
        envelope.stamps().iter().map(|stamp| stamp.name()).collect()
    };

    let from_raw = bus.dispatch(hello("Ada")).unwrap();
    let wrapped = Envelope::wrap(hello("Ada"));
    let from_envelope = bus.dispatch(wrapped.clone()).unwrap();

    assert_eq!(names(&from_raw), names(&from_envelope));
    assert!(from_envelope.same_message(&wrapped));
    assert!(wrapped.stamps().is_empty());

    // Existing stamps are kept ahead of the ones added by this dispatch.
    let stamped = bus.dispatch(Envelope::wrap(hello("Ada")).with(RetryCount(2))).unwrap();
    assert_eq!(names(&stamped), vec![RetryCount::NAME, HandledStamp::NAME]);
}

#[test]
fn send_failure_surfaces_to_the_producer() {
    let bus = MessageBus::builder()
        .senders(SendersLocator::new().route::<Hello, _, _>(["amqp"]))
        .transports(TransportLocator::new().with("amqp", Arc::new(DownTransport)))
        .build()
        .unwrap();

    let err = bus.dispatch(hello("Ada")).unwrap_err();
    assert!(matches!(
        err,
        BusError::Transport(TransportError::ConnectionFailed(_))
    ));
}

#[test]
fn routes_to_unknown_transports_are_rejected_at_build() {
    let result = MessageBus::builder()
        .senders(SendersLocator::new().route::<Hello, _, _>(["amqp"]))
        .build();

    assert!(matches!(result, Err(BusError::UnknownTransport(name)) if name == "amqp"));
}

/// JSON cannot encode a map with non-string keys.
#[derive(Debug, Serialize, Deserialize)]
struct Grid {
    cells: BTreeMap<(u32, u32), u32>,
}

impl Message for Grid {
    const NAME: &'static str = "app.grid";
}

#[test]
fn encode_failure_surfaces_as_serialization_error() {
    let transport = InMemoryTransport::with_serializer(Serializer::default().register::<Grid>());
    let bus = MessageBus::builder()
        .senders(SendersLocator::new().route::<Grid, _, _>(["async"]))
        .transports(TransportLocator::new().with("async", Arc::new(transport.clone())))
        .build()
        .unwrap();

    let err = bus
        .dispatch(Grid {
            cells: BTreeMap::from([((0, 0), 1)]),
        })
        .unwrap_err();

    assert!(matches!(
        err,
        BusError::Serialization(SerializationError::Encode { ref message_type, .. }) if message_type == "app.grid"
    ));
    assert_eq!(err.kind(), "serialization");
    assert!(!err.is_retryable());
    assert_eq!(transport.pending(), 0);
}
