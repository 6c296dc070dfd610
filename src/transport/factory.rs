//! Transport factories - build transports from connection descriptors.

use std::sync::Arc;

use super::error::TransportError;
use super::filesystem::FilesystemTransport;
use super::in_memory::InMemoryTransport;
use super::transport::Transport;
use crate::serializer::Serializer;

/// Creates transports for the DSN schemes it understands.
///
/// Broker adapters implement this so the core never parses
/// broker-specific connection syntax.
pub trait TransportFactory: Send + Sync {
    fn supports(&self, dsn: &str) -> bool;

    fn create(&self, dsn: &str, serializer: Serializer) -> Result<Arc<dyn Transport>, TransportError>;
}

/// `in-memory://`
#[derive(Clone, Copy, Debug, Default)]
pub struct InMemoryTransportFactory;

impl TransportFactory for InMemoryTransportFactory {
    fn supports(&self, dsn: &str) -> bool {
        dsn.starts_with("in-memory://")
    }

    fn create(&self, dsn: &str, serializer: Serializer) -> Result<Arc<dyn Transport>, TransportError> {
        match dsn.trim_start_matches("in-memory://") {
            "" => Ok(Arc::new(InMemoryTransport::new())),
            "?serialize=true" => Ok(Arc::new(InMemoryTransport::with_serializer(serializer))),
            other => Err(TransportError::UnsupportedDsn(format!(
                "in-memory://{} (only ?serialize=true is understood)",
                other
            ))),
        }
    }
}

/// `file://<spool directory>`
#[derive(Clone, Copy, Debug, Default)]
pub struct FilesystemTransportFactory;

impl TransportFactory for FilesystemTransportFactory {
    fn supports(&self, dsn: &str) -> bool {
        dsn.starts_with("file://")
    }

    fn create(&self, dsn: &str, serializer: Serializer) -> Result<Arc<dyn Transport>, TransportError> {
        let path = dsn.trim_start_matches("file://");
        if path.is_empty() {
            return Err(TransportError::UnsupportedDsn(dsn.to_string()));
        }
        Ok(Arc::new(FilesystemTransport::open(path, serializer)?))
    }
}

/// The factories shipped with this crate.
pub fn default_factories() -> Vec<Box<dyn TransportFactory>> {
    vec![
        Box::new(InMemoryTransportFactory),
        Box::new(FilesystemTransportFactory),
    ]
}

/// Create a transport with the first factory that supports `dsn`.
pub fn create_transport(
    factories: &[Box<dyn TransportFactory>],
    dsn: &str,
    serializer: Serializer,
) -> Result<Arc<dyn Transport>, TransportError> {
    factories
        .iter()
        .find(|factory| factory.supports(dsn))
        .ok_or_else(|| TransportError::UnsupportedDsn(dsn.to_string()))?
        .create(dsn, serializer)
}
