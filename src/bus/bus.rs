//! Message Bus - the dispatch entry point.

use std::sync::Arc;

use super::error::BusError;
use crate::envelope::Envelope;
use crate::handler::HandlersLocator;
use crate::middleware::{HandleMessageMiddleware, Middleware, Next, SendMessageMiddleware};
use crate::transport::{SendersLocator, TransportLocator};

/// Message bus - wraps messages in envelopes and drives them through the
/// middleware chain.
///
/// The chain is fixed at construction. The bus is `Send + Sync` and meant to
/// be shared (`Arc<MessageBus>`) between producers and consumer loops.
///
/// ## Example
///
/// ```
/// use messenger_rust::{HandlersLocator, Message, MessageBus};
/// # use serde::{Deserialize, Serialize};
/// # #[derive(Debug, Serialize, Deserialize)]
/// # struct Hello { name: String }
/// # impl Message for Hello { const NAME: &'static str = "app.hello"; }
///
/// let bus = MessageBus::builder()
///     .handlers(HandlersLocator::new().handler(|msg: &Hello| {
///         println!("Hello {}!", msg.name);
///         Ok(())
///     }))
///     .build()
///     .unwrap();
///
/// bus.dispatch(Hello { name: "Ada".into() }).unwrap();
/// ```
#[derive(Clone)]
pub struct MessageBus {
    middleware: Arc<[Arc<dyn Middleware>]>,
}

impl MessageBus {
    /// Create a bus from an explicit, ordered middleware chain.
    pub fn new(middleware: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            middleware: middleware.into(),
        }
    }

    /// Builder for the standard `[custom..., send, handle]` chain.
    pub fn builder() -> MessageBusBuilder {
        MessageBusBuilder::default()
    }

    /// Dispatch a message or an existing envelope.
    ///
    /// Bare messages are wrapped; envelopes are passed through as they are.
    /// Returns the envelope as it left the chain, including stamps added
    /// during this dispatch.
    pub fn dispatch(&self, message: impl Into<Envelope>) -> Result<Envelope, BusError> {
        Next::new(&self.middleware).run(message.into())
    }

    /// Number of middleware stages.
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }
}

/// Assembles a `MessageBus` with the built-in send and handle stages.
///
/// Custom middleware registered with `middleware()` runs before the send
/// stage, in registration order. For any other order, build the chain by
/// hand and use `MessageBus::new`.
#[derive(Default)]
pub struct MessageBusBuilder {
    middleware: Vec<Arc<dyn Middleware>>,
    senders: SendersLocator,
    transports: TransportLocator,
    handlers: HandlersLocator,
    allow_no_handlers: bool,
}

impl MessageBusBuilder {
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn senders(mut self, senders: SendersLocator) -> Self {
        self.senders = senders;
        self
    }

    pub fn transports(mut self, transports: TransportLocator) -> Self {
        self.transports = transports;
        self
    }

    pub fn handlers(mut self, handlers: HandlersLocator) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn allow_no_handlers(mut self, allow: bool) -> Self {
        self.allow_no_handlers = allow;
        self
    }

    /// Build the bus, checking that every route names a registered transport.
    pub fn build(self) -> Result<MessageBus, BusError> {
        if let Some((_, missing)) = self
            .senders
            .transport_names()
            .find(|(_, name)| !self.transports.contains(name))
        {
            return Err(BusError::UnknownTransport(missing.to_string()));
        }

        let mut chain = self.middleware;
        chain.push(Arc::new(SendMessageMiddleware::new(
            self.senders,
            self.transports,
        )));
        chain.push(Arc::new(
            HandleMessageMiddleware::new(self.handlers).allow_no_handlers(self.allow_no_handlers),
        ));
        Ok(MessageBus::new(chain))
    }
}
