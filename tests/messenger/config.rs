//! Wiring a messenger from JSON configuration.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use messenger_rust::transport::{default_factories, TransportFactory};
use messenger_rust::{
    ConfigError, HandlerError, HandlersLocator, Messenger, MessengerConfig, Outcome, Serializer,
    Transport, TransportError,
};

use crate::support::{hello, Hello, RecordingTransport};

/// Resolves `recording://` to one shared `RecordingTransport`.
struct RecordingFactory(RecordingTransport);

impl TransportFactory for RecordingFactory {
    fn supports(&self, dsn: &str) -> bool {
        dsn.starts_with("recording://")
    }

    fn create(&self, _dsn: &str, _serializer: Serializer) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(Arc::new(self.0.clone()))
    }
}

#[test]
fn custom_factory_and_retry_from_config() {
    let recording = RecordingTransport::new();
    let config = MessengerConfig::from_json_str(
        r#"{
            "transports": {
                "amqp": {
                    "dsn": "recording://localhost",
                    "retry_strategy": { "max_retries": 1, "delay_ms": 250 }
                }
            },
            "routing": { "app.hello": ["amqp"] }
        }"#,
    )
    .unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let messenger = Messenger::builder(config)
        .factory(RecordingFactory(recording.clone()))
        .handlers(HandlersLocator::new().handler(move |_: &Hello| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(HandlerError::Rejected("try later".into()))
        }))
        .build()
        .unwrap();

    messenger.dispatch(hello("Ada")).unwrap();
    assert_eq!(recording.sends(), 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 0);

    let mut worker = messenger.worker("amqp").unwrap();
    assert_eq!(
        worker.process_next(),
        Outcome::Retried {
            retry_count: 1,
            delay: Duration::from_millis(250)
        }
    );
    assert_eq!(worker.process_next(), Outcome::DeadLettered);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(recording.acks(), 0);
}

#[test]
fn from_config_uses_given_factories() {
    let config = MessengerConfig::from_json_str(
        r#"{ "transports": { "sync": { "dsn": "in-memory://" } }, "allow_no_handlers": true }"#,
    )
    .unwrap();

    let messenger = Messenger::from_config(config, default_factories(), HandlersLocator::new()).unwrap();

    assert_eq!(messenger.transport_names(), vec!["sync"]);
    assert!(messenger.dispatch(hello("Ada")).is_ok());
}

#[test]
fn invalid_multiplier_is_reported_per_transport() {
    let config = MessengerConfig::from_json_str(
        r#"{ "transports": { "async": { "dsn": "in-memory://", "retry_strategy": { "multiplier": 0.5 } } } }"#,
    )
    .unwrap();

    let err = Messenger::from_config(config, default_factories(), HandlersLocator::new())
        .err()
        .unwrap();

    assert!(matches!(err, ConfigError::InvalidRetry { ref transport, .. } if transport == "async"));
}

#[test]
fn worker_options_come_from_config() {
    let config = MessengerConfig::from_json_str(
        r#"{
            "transports": { "async": { "dsn": "in-memory://" } },
            "worker": { "idle_sleep_ms": 5, "message_limit": 2 }
        }"#,
    )
    .unwrap();
    let messenger = Messenger::from_config(config, default_factories(), HandlersLocator::new()).unwrap();

    let worker = messenger.worker("async").unwrap();
    assert_eq!(worker.options().idle_sleep, Duration::from_millis(5));
    assert_eq!(worker.options().message_limit, Some(2));
}
