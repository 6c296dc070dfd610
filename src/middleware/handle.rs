//! Handle stage - runs the local handlers for a message.

use tracing::debug;

use super::middleware::{Middleware, Next};
use crate::bus::BusError;
use crate::envelope::{Envelope, HandledStamp};
use crate::handler::HandlersLocator;

/// Invokes every handler registered for the message, in registration order.
///
/// The first failing handler aborts the remaining ones and its error is the
/// stage's result. Each successful handler adds a `HandledStamp`.
pub struct HandleMessageMiddleware {
    handlers: HandlersLocator,
    allow_no_handlers: bool,
}

impl HandleMessageMiddleware {
    pub fn new(handlers: HandlersLocator) -> Self {
        Self {
            handlers,
            allow_no_handlers: false,
        }
    }

    /// Let messages without handlers pass instead of failing with `NoHandler`.
    pub fn allow_no_handlers(mut self, allow: bool) -> Self {
        self.allow_no_handlers = allow;
        self
    }
}

impl Middleware for HandleMessageMiddleware {
    fn handle(&self, envelope: Envelope, next: Next<'_>) -> Result<Envelope, BusError> {
        let message_type = envelope.message_name();
        let handlers = self.handlers.handlers_for(message_type);

        if handlers.is_empty() {
            if self.allow_no_handlers {
                return next.run(envelope);
            }
            return Err(BusError::NoHandler {
                message_type: message_type.to_string(),
            });
        }

        let mut envelope = envelope;
        for handler in handlers {
            handler
                .call(envelope.message())
                .map_err(|source| BusError::Handler {
                    message_type: message_type.to_string(),
                    handler: handler.name().to_string(),
                    source,
                })?;
            debug!(message_type, handler = handler.name(), "handled message");
            envelope = envelope.with(HandledStamp {
                handler: handler.name().to_string(),
            });
        }

        next.run(envelope)
    }
}
