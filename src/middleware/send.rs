//! Send stage - hands routed messages to their transports.

use tracing::debug;

use super::middleware::{Middleware, Next};
use crate::bus::BusError;
use crate::envelope::{Envelope, ReceivedTransport, SentStamp};
use crate::transport::{SendersLocator, TransportLocator};

/// Sends envelopes to the transports their message type is routed to.
///
/// If the message has at least one route, the envelope is sent to every
/// routed transport in order, a `SentStamp` is added per transport, and the
/// chain stops: nothing after this stage (in particular no handler) runs.
/// Unrouted messages, and envelopes that were just received from a
/// transport, continue down the chain to be handled locally.
pub struct SendMessageMiddleware {
    senders: SendersLocator,
    transports: TransportLocator,
}

impl SendMessageMiddleware {
    pub fn new(senders: SendersLocator, transports: TransportLocator) -> Self {
        Self {
            senders,
            transports,
        }
    }
}

impl Middleware for SendMessageMiddleware {
    fn handle(&self, envelope: Envelope, next: Next<'_>) -> Result<Envelope, BusError> {
        if envelope.last::<ReceivedTransport>().is_some() {
            return next.run(envelope);
        }

        let routes = self.senders.senders_for(envelope.message_name());
        if routes.is_empty() {
            return next.run(envelope);
        }

        let mut envelope = envelope;
        for name in routes {
            let transport = self
                .transports
                .get(name)
                .ok_or_else(|| BusError::UnknownTransport(name.clone()))?;
            transport.send(&envelope)?;
            debug!(
                message_type = envelope.message_name(),
                transport = %name,
                "sent message"
            );
            envelope = envelope.with(SentStamp::now(name.as_str()));
        }

        Ok(envelope)
    }
}
