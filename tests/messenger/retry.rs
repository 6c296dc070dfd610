//! Worker retry and dead-letter decisions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use messenger_rust::{
    Envelope, HandlerError, HandlersLocator, MessageBus, MultiplierRetryStrategy, Outcome,
    Sender, SendersLocator, TransportLocator, Worker, WorkerOptions,
};

use crate::support::{hello, Call, DownTransport, Hello, RecordingTransport};

fn failing_bus(attempts: Arc<AtomicUsize>) -> Arc<MessageBus> {
    Arc::new(
        MessageBus::builder()
            .handlers(HandlersLocator::new().handler(move |_: &Hello| {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(HandlerError::Rejected("downstream unavailable".into()))
            }))
            .build()
            .unwrap(),
    )
}

fn strategy(max_retries: u32) -> Arc<MultiplierRetryStrategy> {
    Arc::new(MultiplierRetryStrategy::new(max_retries, Duration::from_millis(100), 2.0, None).unwrap())
}

#[test]
fn three_retries_then_dead_letter() {
    let transport = RecordingTransport::new();
    transport.send(&Envelope::wrap(hello("Ada"))).unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));
    let mut worker = Worker::new(failing_bus(attempts.clone()), "async", Arc::new(transport.clone()))
        .with_retry_strategy(strategy(3));

    let outcomes: Vec<_> = (0..4).map(|_| worker.process_next()).collect();
    assert_eq!(
        outcomes,
        vec![
            Outcome::Retried { retry_count: 1, delay: Duration::from_millis(100) },
            Outcome::Retried { retry_count: 2, delay: Duration::from_millis(200) },
            Outcome::Retried { retry_count: 3, delay: Duration::from_millis(400) },
            Outcome::DeadLettered,
        ]
    );
    assert_eq!(worker.process_next(), Outcome::Idle);
    assert_eq!(attempts.load(Ordering::SeqCst), 4);

    let delayed: Vec<u64> = transport
        .calls()
        .iter()
        .filter_map(|call| match call {
            Call::Send { delay_ms, .. } if *delay_ms > 0 => Some(*delay_ms),
            _ => None,
        })
        .collect();
    assert_eq!(delayed.len(), 3);
    assert!(delayed.windows(2).all(|w| w[0] <= w[1]));

    assert_eq!(transport.rejects(false), 4);
    assert_eq!(transport.rejects(true), 0);
    assert_eq!(transport.acks(), 0);
}

#[test]
fn retry_count_travels_with_the_resent_copy() {
    let transport = RecordingTransport::new();
    transport.send(&Envelope::wrap(hello("Ada"))).unwrap();

    let mut worker = Worker::new(
        failing_bus(Arc::new(AtomicUsize::new(0))),
        "async",
        Arc::new(transport.clone()),
    )
    .with_retry_strategy(strategy(2));

    worker.process_next();
    worker.process_next();

    let sends: Vec<_> = transport
        .calls()
        .into_iter()
        .filter(|call| matches!(call, Call::Send { .. }))
        .collect();
    assert_eq!(
        sends,
        vec![
            Call::Send { retry_count: 0, delay_ms: 0 },
            Call::Send { retry_count: 1, delay_ms: 100 },
            Call::Send { retry_count: 2, delay_ms: 200 },
        ]
    );
}

#[test]
fn success_acks_once_without_rejects() {
    let transport = RecordingTransport::new();
    transport.send(&Envelope::wrap(hello("Ada"))).unwrap();

    let bus = Arc::new(
        MessageBus::builder()
            .handlers(HandlersLocator::new().handler(|_: &Hello| Ok(())))
            .build()
            .unwrap(),
    );
    let mut worker = Worker::new(bus, "async", Arc::new(transport.clone())).with_retry_strategy(strategy(3));

    assert_eq!(worker.process_next(), Outcome::Acknowledged);
    assert_eq!(transport.acks(), 1);
    assert_eq!(transport.rejects(false) + transport.rejects(true), 0);
}

#[test]
fn no_strategy_means_first_failure_is_final() {
    let transport = RecordingTransport::new();
    transport.send(&Envelope::wrap(hello("Ada"))).unwrap();

    let mut worker = Worker::new(
        failing_bus(Arc::new(AtomicUsize::new(0))),
        "async",
        Arc::new(transport.clone()),
    );

    assert_eq!(worker.process_next(), Outcome::DeadLettered);
    assert_eq!(transport.sends(), 1);
    assert_eq!(transport.rejects(false), 1);
}

#[test]
fn missing_handler_is_never_retried() {
    let transport = RecordingTransport::new();
    transport.send(&Envelope::wrap(hello("Ada"))).unwrap();

    let bus = Arc::new(MessageBus::builder().build().unwrap());
    let mut worker = Worker::new(bus, "async", Arc::new(transport.clone())).with_retry_strategy(strategy(3));

    assert_eq!(worker.process_next(), Outcome::DeadLettered);
    assert_eq!(transport.sends(), 1);
}

#[test]
fn consumed_message_is_handled_locally_not_resent() {
    let transport = RecordingTransport::new();
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = handled.clone();

    let bus = Arc::new(
        MessageBus::builder()
            .senders(SendersLocator::new().route::<Hello, _, _>(["async"]))
            .transports(TransportLocator::new().with("async", Arc::new(transport.clone())))
            .handlers(HandlersLocator::new().handler(move |_: &Hello| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .build()
            .unwrap(),
    );

    bus.dispatch(hello("Ada")).unwrap();
    assert_eq!(handled.load(Ordering::SeqCst), 0);

    let mut worker = Worker::new(bus, "async", Arc::new(transport.clone()));
    assert_eq!(worker.process_next(), Outcome::Acknowledged);

    assert_eq!(handled.load(Ordering::SeqCst), 1);
    assert_eq!(transport.sends(), 1);
    assert_eq!(transport.queued(), 0);
}

#[test]
fn polling_errors_never_stop_the_loop() {
    let bus = Arc::new(MessageBus::builder().build().unwrap());
    let mut worker = Worker::new(bus, "amqp", Arc::new(DownTransport)).with_options(
        WorkerOptions::default()
            .with_idle_sleep(Duration::from_millis(1))
            .with_max_backoff(Duration::from_millis(4))
            .with_time_limit(Duration::from_millis(50)),
    );

    assert_eq!(worker.process_next(), Outcome::TransportFailed);

    let (_stop_tx, stop_rx) = std::sync::mpsc::channel();
    let stats = worker.run(&stop_rx);

    assert!(stats.transport_errors > 1);
    assert_eq!(stats.processed(), 0);
}
