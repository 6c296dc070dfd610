//! Error types for message handlers.

use std::error::Error as StdError;

use thiserror::Error;

/// Error type for message handler failures.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Business logic rejected the message; a later attempt may succeed.
    #[error("rejected: {0}")]
    Rejected(String),

    /// A resource the message refers to does not exist (yet).
    #[error("not found: {0}")]
    NotFound(String),

    /// Payload decode / deserialization failed inside the handler.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// Retrying cannot help; the message goes straight to dead-letter.
    #[error("unrecoverable: {0}")]
    Unrecoverable(String),

    #[error("handler error: {0}")]
    Other(Box<dyn StdError + Send + Sync>),
}

impl HandlerError {
    /// Whether the retry strategy may schedule another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            HandlerError::DecodeFailed(_) | HandlerError::Unrecoverable(_)
        )
    }

    /// Short machine-readable kind, recorded in `ErrorDetails` stamps.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::Rejected(_) => "rejected",
            HandlerError::NotFound(_) => "not_found",
            HandlerError::DecodeFailed(_) => "decode_failed",
            HandlerError::Unrecoverable(_) => "unrecoverable",
            HandlerError::Other(_) => "other",
        }
    }

    /// Wrap any error as `HandlerError::Other`.
    pub fn other(err: impl StdError + Send + Sync + 'static) -> Self {
        HandlerError::Other(Box::new(err))
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::DecodeFailed(err.to_string())
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        HandlerError::other(err)
    }
}
