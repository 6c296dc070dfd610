//! Error types for the serialization boundary.

use thiserror::Error;

/// A payload could not be encoded or decoded at a transport boundary.
///
/// Re-delivering the same bytes cannot fix any of these, so consumers
/// dead-letter the delivery instead of retrying it.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("failed to encode \"{message_type}\": {reason}")]
    Encode { message_type: String, reason: String },

    #[error("failed to decode \"{message_type}\": {reason}")]
    Decode { message_type: String, reason: String },

    #[error("no decoder registered for message type \"{0}\"")]
    UnknownMessageType(String),

    #[error("malformed envelope frame: {0}")]
    Frame(String),
}
