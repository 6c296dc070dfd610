//! Messenger - a bus, its transports and their consumers, assembled from
//! a `MessengerConfig`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::config::MessengerConfig;
use super::error::ConfigError;
use crate::bus::{BusError, MessageBus, MessageBusBuilder};
use crate::envelope::{Envelope, Message};
use crate::handler::HandlersLocator;
use crate::middleware::Middleware;
use crate::retry::RetryStrategy;
use crate::serializer::Serializer;
use crate::transport::{
    create_transport, default_factories, SendersLocator, Transport, TransportFactory,
    TransportLocator,
};
use crate::worker::{Consumer, Worker, WorkerOptions};

/// Everything needed to dispatch and consume, wired from configuration.
///
/// ## Example
///
/// ```
/// use messenger_rust::{HandlersLocator, Message, Messenger, MessengerConfig};
/// # use serde::{Deserialize, Serialize};
/// # #[derive(Debug, Serialize, Deserialize)]
/// # struct Hello { name: String }
/// # impl Message for Hello { const NAME: &'static str = "app.hello"; }
///
/// let config = MessengerConfig::from_json_str(r#"{
///     "transports": { "async": { "dsn": "in-memory://" } },
///     "routing": { "app.hello": ["async"] }
/// }"#).unwrap();
///
/// let messenger = Messenger::builder(config)
///     .handlers(HandlersLocator::new().handler(|_: &Hello| Ok(())))
///     .register::<Hello>()
///     .build()
///     .unwrap();
///
/// messenger.dispatch(Hello { name: "Ada".into() }).unwrap();
/// let mut worker = messenger.worker("async").unwrap();
/// assert_eq!(worker.process_next(), messenger_rust::Outcome::Acknowledged);
/// ```
pub struct Messenger {
    bus: Arc<MessageBus>,
    transports: TransportLocator,
    retry: HashMap<String, Arc<dyn RetryStrategy>>,
    failure_transport: Option<String>,
    worker_options: WorkerOptions,
}

impl Messenger {
    pub fn builder(config: MessengerConfig) -> MessengerBuilder {
        MessengerBuilder::new(config)
    }

    /// Assemble with the given factories and handlers and no registered
    /// message types. Use the builder when transports must decode messages.
    pub fn from_config(
        config: MessengerConfig,
        factories: Vec<Box<dyn TransportFactory>>,
        handlers: HandlersLocator,
    ) -> Result<Self, ConfigError> {
        MessengerBuilder::new(config)
            .factories(factories)
            .handlers(handlers)
            .build()
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn dispatch(&self, message: impl Into<Envelope>) -> Result<Envelope, BusError> {
        self.bus.dispatch(message)
    }

    pub fn transport(&self, name: &str) -> Option<Arc<dyn Transport>> {
        self.transports.get(name)
    }

    pub fn transport_names(&self) -> Vec<&str> {
        self.transports.names()
    }

    pub fn worker_options(&self) -> &WorkerOptions {
        &self.worker_options
    }

    /// A consumer loop for one transport, with its retry strategy, the
    /// failure transport and the configured worker options.
    pub fn worker(&self, name: &str) -> Result<Worker, ConfigError> {
        let transport = self
            .transports
            .get(name)
            .ok_or_else(|| ConfigError::UnknownTransport {
                name: name.to_string(),
                referenced_by: "consumer".to_string(),
            })?;

        let mut worker = Worker::new(self.bus.clone(), name, transport)
            .with_options(self.worker_options.clone());

        if let Some(strategy) = self.retry.get(name) {
            worker = worker.with_retry_strategy(strategy.clone());
        }
        if let Some(failure) = self.failure_transport.as_deref().filter(|f| *f != name) {
            if let Some(transport) = self.transports.get(failure) {
                worker = worker.with_failure_transport(failure, transport);
            }
        }
        Ok(worker)
    }

    /// Start one background worker per named transport.
    ///
    /// All names are resolved before any thread starts.
    pub fn consume<S: AsRef<str>>(&self, names: &[S]) -> Result<Consumer, ConfigError> {
        let workers = names
            .iter()
            .map(|name| self.worker(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(workers.into_iter().fold(Consumer::new(), Consumer::spawn))
    }
}

/// Builds a `Messenger`; see `Messenger::builder`.
pub struct MessengerBuilder {
    config: MessengerConfig,
    factories: Vec<Box<dyn TransportFactory>>,
    serializer: Serializer,
    bus: MessageBusBuilder,
}

impl MessengerBuilder {
    fn new(config: MessengerConfig) -> Self {
        let serializer = Serializer::new(config.serializer);
        Self {
            config,
            factories: default_factories(),
            serializer,
            bus: MessageBus::builder(),
        }
    }

    /// Replace the transport factories (defaults: `in-memory://`, `file://`).
    pub fn factories(mut self, factories: Vec<Box<dyn TransportFactory>>) -> Self {
        self.factories = factories;
        self
    }

    /// Add a factory, tried before the ones already present.
    pub fn factory(mut self, factory: impl TransportFactory + 'static) -> Self {
        self.factories.insert(0, Box::new(factory));
        self
    }

    pub fn handlers(mut self, handlers: HandlersLocator) -> Self {
        self.bus = self.bus.handlers(handlers);
        self
    }

    /// Custom middleware, run before the send stage.
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.bus = self.bus.middleware(middleware);
        self
    }

    /// Make `M` decodable by serializing transports.
    pub fn register<M: Message>(mut self) -> Self {
        self.serializer = self.serializer.register::<M>();
        self
    }

    pub fn build(self) -> Result<Messenger, ConfigError> {
        let config = self.config;
        config.validate()?;

        let mut transports = TransportLocator::new();
        let mut retry: HashMap<String, Arc<dyn RetryStrategy>> = HashMap::new();

        for (name, transport_config) in &config.transports {
            let transport =
                create_transport(&self.factories, &transport_config.dsn, self.serializer.clone())
                    .map_err(|source| ConfigError::Transport {
                        name: name.clone(),
                        source,
                    })?;
            transports.insert(name.clone(), transport);

            let strategy = transport_config
                .retry_strategy
                .strategy()
                .map_err(|source| ConfigError::InvalidRetry {
                    transport: name.clone(),
                    source,
                })?;
            if let Some(strategy) = strategy {
                retry.insert(name.clone(), Arc::new(strategy));
            }

            debug!(transport = %name, dsn = %transport_config.dsn, "transport created");
        }

        let senders = config
            .routing
            .iter()
            .fold(SendersLocator::new(), |senders, (message_type, names)| {
                senders.route_name(message_type.clone(), names.iter().cloned())
            });

        let bus = self
            .bus
            .senders(senders)
            .transports(transports.clone())
            .allow_no_handlers(config.allow_no_handlers)
            .build()?;

        Ok(Messenger {
            bus: Arc::new(bus),
            transports,
            retry,
            failure_transport: config.failure_transport,
            worker_options: config.worker,
        })
    }
}
