//! Core transport traits.

use super::error::TransportError;
use crate::envelope::Envelope;

/// Outbound half of a transport.
///
/// Implementations must be safe to call from many producer threads at once
/// (request handlers and consumer loops issuing retries); serialize access to
/// the underlying connection internally if the protocol needs it.
pub trait Sender: Send + Sync {
    /// Hand the envelope to the broker for later delivery.
    ///
    /// A `DelayStamp` on the envelope asks for delayed delivery.
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError>;
}

/// Inbound half of a transport.
///
/// Pull-based: the consumer loop owns the polling cadence.
pub trait Receiver: Send + Sync {
    /// Take the next available delivery, without blocking.
    ///
    /// Returned envelopes carry a `TransportMessageId` so they can be passed
    /// back to `ack` / `reject`.
    fn get(&self) -> Result<Option<Envelope>, TransportError>;

    /// Confirm successful processing. The delivery must not be redelivered.
    fn ack(&self, envelope: &Envelope) -> Result<(), TransportError>;

    /// Signal failed processing. With `requeue` the delivery becomes
    /// available again; without it the delivery is discarded.
    fn reject(&self, envelope: &Envelope, requeue: bool) -> Result<(), TransportError>;
}

/// Combined trait for a bidirectional broker connection.
pub trait Transport: Sender + Receiver {}

// Blanket implementation
impl<T: Sender + Receiver> Transport for T {}
