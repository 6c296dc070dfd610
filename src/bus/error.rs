//! Error types for dispatching through the bus.

use thiserror::Error;

use crate::handler::HandlerError;
use crate::serializer::SerializationError;
use crate::transport::TransportError;

/// Failure of a single dispatch.
///
/// Middleware propagates the first failure unchanged; only the consumer
/// loop decides between retry and dead-letter.
#[derive(Debug, Error)]
pub enum BusError {
    /// The transport failed. Serialization failures reported by a transport
    /// are converted to `Serialization` instead.
    #[error(transparent)]
    Transport(TransportError),

    /// A message reached the handle stage with nothing registered for it.
    #[error("no handler for message \"{message_type}\"")]
    NoHandler { message_type: String },

    #[error("handler \"{handler}\" failed for message \"{message_type}\": {source}")]
    Handler {
        message_type: String,
        handler: String,
        source: HandlerError,
    },

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// A route names a transport that was never registered.
    #[error("unknown transport \"{0}\"")]
    UnknownTransport(String),
}

impl From<TransportError> for BusError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Serialization(err) => BusError::Serialization(err),
            other => BusError::Transport(other),
        }
    }
}

impl BusError {
    /// Only recoverable handler failures are eligible for retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            BusError::Handler { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Short machine-readable kind, recorded in `ErrorDetails` stamps.
    pub fn kind(&self) -> &'static str {
        match self {
            BusError::Transport(_) => "transport",
            BusError::NoHandler { .. } => "no_handler",
            BusError::Handler { source, .. } => source.kind(),
            BusError::Serialization(_) => "serialization",
            BusError::UnknownTransport(_) => "unknown_transport",
        }
    }
}
