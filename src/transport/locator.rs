//! Name -> transport registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::transport::Transport;

/// Resolves transport names to transport instances.
///
/// Built once at startup and shared read-only between producers and
/// consumer loops.
#[derive(Clone, Default)]
pub struct TransportLocator {
    transports: BTreeMap<String, Arc<dyn Transport>>,
}

impl TransportLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport under `name`, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, transport: Arc<dyn Transport>) {
        self.transports.insert(name.into(), transport);
    }

    /// Builder-style `insert`.
    pub fn with(mut self, name: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        self.insert(name, transport);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transport>> {
        self.transports.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transports.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.transports.keys().map(|s| s.as_str()).collect()
    }
}

impl fmt::Debug for TransportLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportLocator")
            .field("transports", &self.names())
            .finish()
    }
}
