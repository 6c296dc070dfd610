//! Error types for transport operations.

use thiserror::Error;

use crate::serializer::SerializationError;

/// A transport failed to send, receive, acknowledge or reject a delivery.
///
/// The bus never retries these on its own: producers see them from
/// `dispatch`, consumers log them and keep polling.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection to the broker failed or was lost.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The broker refused the operation.
    #[error("rejected by broker: {0}")]
    Rejected(String),

    /// Ack/reject for an envelope this transport did not deliver.
    #[error("unknown delivery: {0}")]
    UnknownDelivery(String),

    /// No factory understands the connection descriptor.
    #[error("unsupported transport dsn: {0}")]
    UnsupportedDsn(String),

    #[error("transport state lock poisoned during {0}")]
    LockPoisoned(&'static str),

    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A delivery could not be decoded. The transport has already
    /// dead-lettered it by the time this is returned.
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}
