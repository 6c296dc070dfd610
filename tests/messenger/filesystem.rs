//! The filesystem spool as a cross-process transport.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use messenger_rust::{
    Envelope, FilesystemTransport, Format, HandlerError, HandlersLocator, Messenger,
    MessengerConfig, Outcome, Receiver, RetryCount, Serializer,
};

use crate::support::{hello, Hello};

fn config(dir: &std::path::Path, format: &str) -> MessengerConfig {
    MessengerConfig::from_json_str(&format!(
        r#"{{
            "transports": {{
                "async": {{ "dsn": "file://{}", "retry_strategy": {{ "max_retries": 1, "delay_ms": 0 }} }}
            }},
            "routing": {{ "app.hello": ["async"] }},
            "serializer": "{}"
        }}"#,
        dir.display(),
        format
    ))
    .unwrap()
}

fn messenger(dir: &std::path::Path, format: &str, handlers: HandlersLocator) -> Messenger {
    Messenger::builder(config(dir, format))
        .handlers(handlers)
        .register::<Hello>()
        .build()
        .unwrap()
}

#[test]
fn producer_and_consumer_share_a_spool() {
    let dir = tempfile::tempdir().unwrap();
    let received = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = received.clone();

    // Two independently assembled messengers stand in for two processes.
    let producer = messenger(dir.path(), "bitcode", HandlersLocator::new());
    let consumer = messenger(
        dir.path(),
        "bitcode",
        HandlersLocator::new().handler(move |msg: &Hello| {
            sink.lock().unwrap().push(msg.name.clone());
            Ok(())
        }),
    );

    producer.dispatch(hello("Ada")).unwrap();
    producer.dispatch(hello("Grace")).unwrap();

    let mut worker = consumer.worker("async").unwrap();
    assert_eq!(worker.process_next(), Outcome::Acknowledged);
    assert_eq!(worker.process_next(), Outcome::Acknowledged);
    assert_eq!(worker.process_next(), Outcome::Idle);

    assert_eq!(*received.lock().unwrap(), vec!["Ada", "Grace"]);
    assert_eq!(fs::read_dir(dir.path().join("processing")).unwrap().count(), 0);
}

#[test]
fn retries_are_spooled_then_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let messenger = messenger(
        dir.path(),
        "json",
        HandlersLocator::new().handler(move |_: &Hello| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(HandlerError::Rejected("not yet".into()))
        }),
    );

    messenger.dispatch(hello("Ada")).unwrap();

    let mut worker = messenger.worker("async").unwrap();
    assert_eq!(
        worker.process_next(),
        Outcome::Retried {
            retry_count: 1,
            delay: Duration::ZERO
        }
    );
    assert_eq!(worker.process_next(), Outcome::DeadLettered);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    let spool = FilesystemTransport::open(dir.path(), Serializer::new(Format::Json)).unwrap();
    assert_eq!(spool.rejected().unwrap().len(), 2);
    assert_eq!(spool.pending().unwrap(), 0);
}

#[test]
fn undecodable_file_is_dead_lettered() {
    let dir = tempfile::tempdir().unwrap();
    let messenger = messenger(dir.path(), "json", HandlersLocator::new().handler(|_: &Hello| Ok(())));

    fs::write(
        dir.path().join("queue").join("00000000000000000000-garbage.json"),
        b"not a frame",
    )
    .unwrap();

    let mut worker = messenger.worker("async").unwrap();
    assert_eq!(worker.process_next(), Outcome::DeadLettered);
    assert_eq!(worker.process_next(), Outcome::Idle);

    let spool = FilesystemTransport::open(dir.path(), Serializer::default()).unwrap();
    assert_eq!(spool.rejected().unwrap(), vec!["00000000000000000000-garbage.json"]);
}

#[test]
fn stale_claims_are_redelivered() {
    let dir = tempfile::tempdir().unwrap();
    let producer = messenger(dir.path(), "json", HandlersLocator::new());
    producer.dispatch(hello("Ada")).unwrap();

    let spool = FilesystemTransport::open(dir.path(), Serializer::new(Format::Json).register::<Hello>()).unwrap();
    let claimed = spool.get().unwrap().unwrap();
    assert_eq!(claimed.message_as::<Hello>(), Some(&hello("Ada")));
    assert_eq!(spool.pending().unwrap(), 0);

    // The claiming consumer "crashed" before acking.
    assert_eq!(spool.requeue_stale(Duration::ZERO).unwrap(), 1);
    assert_eq!(spool.pending().unwrap(), 1);
}

#[test]
fn late_retry_with_overflowing_backoff_is_spooled() {
    let dir = tempfile::tempdir().unwrap();
    let config = MessengerConfig::from_json_str(&format!(
        r#"{{
            "transports": {{
                "async": {{
                    "dsn": "file://{}",
                    "retry_strategy": {{ "max_retries": 30, "delay_ms": 1000, "multiplier": 10.0 }}
                }}
            }},
            "routing": {{ "app.hello": ["async"] }}
        }}"#,
        dir.path().display()
    ))
    .unwrap();
    let messenger = Messenger::builder(config)
        .handlers(HandlersLocator::new().handler(|_: &Hello| Err(HandlerError::Rejected("down".into()))))
        .register::<Hello>()
        .build()
        .unwrap();

    messenger
        .dispatch(Envelope::wrap(hello("Ada")).with(RetryCount(25)))
        .unwrap();

    let mut worker = messenger.worker("async").unwrap();
    assert_eq!(
        worker.process_next(),
        Outcome::Retried {
            retry_count: 26,
            delay: Duration::MAX
        }
    );
    assert_eq!(worker.process_next(), Outcome::Idle);

    let spool = FilesystemTransport::open(dir.path(), Serializer::default()).unwrap();
    assert_eq!(spool.pending().unwrap(), 1);
    let queued: Vec<_> = fs::read_dir(dir.path().join("queue"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    assert!(queued[0].starts_with(&format!("{:020}-", u64::MAX)));

    let frame: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.path().join("queue").join(&queued[0])).unwrap()).unwrap();
    let delay = frame["stamps"]
        .as_array()
        .unwrap()
        .iter()
        .find(|stamp| stamp["name"] == "delay")
        .unwrap();
    assert_eq!(delay["value"]["delay_ms"].as_u64(), Some(u64::MAX));
}

#[test]
fn claim_age_is_measured_from_the_claim() {
    let dir = tempfile::tempdir().unwrap();
    let producer = messenger(dir.path(), "json", HandlersLocator::new());
    producer.dispatch(hello("Ada")).unwrap();

    // Sent long before it is claimed.
    std::thread::sleep(Duration::from_millis(300));
    let spool = FilesystemTransport::open(dir.path(), Serializer::new(Format::Json).register::<Hello>()).unwrap();
    let claimed = spool.get().unwrap().unwrap();

    assert_eq!(spool.requeue_stale(Duration::from_millis(200)).unwrap(), 0);
    assert_eq!(spool.pending().unwrap(), 0);
    spool.ack(&claimed).unwrap();
}
