use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::bus::BusError;
use crate::retry::InvalidMultiplier;
use crate::transport::TransportError;

/// Errors loading a configuration or assembling a `Messenger` from it.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A transport name that is not declared under `transports`.
    #[error("unknown transport \"{name}\" referenced by {referenced_by}")]
    UnknownTransport { name: String, referenced_by: String },

    #[error("invalid retry strategy for transport \"{transport}\": {source}")]
    InvalidRetry {
        transport: String,
        source: InvalidMultiplier,
    },

    #[error("failed to create transport \"{name}\": {source}")]
    Transport { name: String, source: TransportError },

    #[error(transparent)]
    Bus(#[from] BusError),
}
