//! Stamps: typed metadata carried next to a message.

use std::any::Any;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Typed metadata attached to an `Envelope`.
///
/// Stamps marked `SENDABLE = false` describe local processing state (which
/// transport a message came from, which handlers ran) and are stripped before
/// an envelope crosses a transport boundary.
pub trait Stamp: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// Wire name of this stamp kind.
    const NAME: &'static str;

    /// Whether the stamp survives a trip through a transport.
    const SENDABLE: bool = true;
}

/// Object-safe view over any `Stamp`.
pub trait AnyStamp: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn sendable(&self) -> bool;

    fn as_any(&self) -> &dyn Any;

    /// Encode the stamp as a JSON value for the wire frame.
    fn to_value(&self) -> Result<serde_json::Value, serde_json::Error>;
}

impl<S: Stamp> AnyStamp for S {
    fn name(&self) -> &'static str {
        S::NAME
    }

    fn sendable(&self) -> bool {
        S::SENDABLE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Number of times the message has been re-sent after a handler failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryCount(pub u32);

impl Stamp for RetryCount {
    const NAME: &'static str = "retry_count";
}

/// Name of the transport the message was received from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedTransport {
    pub name: String,
}

impl ReceivedTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Stamp for ReceivedTransport {
    const NAME: &'static str = "received_transport";
    const SENDABLE: bool = false;
}

/// Records that the message was handed to a transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentStamp {
    pub transport: String,
    /// Milliseconds since the Unix epoch.
    pub sent_at_ms: u64,
}

impl SentStamp {
    /// Stamp for a send happening now.
    pub fn now(transport: impl Into<String>) -> Self {
        let sent_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            transport: transport.into(),
            sent_at_ms,
        }
    }
}

impl Stamp for SentStamp {
    const NAME: &'static str = "sent";
}

/// Asks the transport to hold the message back before delivering it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayStamp {
    pub delay_ms: u64,
}

impl DelayStamp {
    /// Delays beyond `u64::MAX` milliseconds saturate.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Stamp for DelayStamp {
    const NAME: &'static str = "delay";
}

/// Transport-specific delivery identifier, used to ack or reject a delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMessageId {
    pub id: String,
}

impl TransportMessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Stamp for TransportMessageId {
    const NAME: &'static str = "transport_message_id";
    const SENDABLE: bool = false;
}

/// Records that a handler processed the message successfully.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandledStamp {
    pub handler: String,
}

impl Stamp for HandledStamp {
    const NAME: &'static str = "handled";
    const SENDABLE: bool = false;
}

/// Describes the failure that caused a retry or a dead-letter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub kind: String,
    pub message: String,
}

impl Stamp for ErrorDetails {
    const NAME: &'static str = "error_details";
}
