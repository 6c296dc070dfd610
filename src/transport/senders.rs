//! Senders locator - message type -> transport names.

use std::collections::HashMap;

use crate::envelope::Message;

/// Routing key matching every message type without an explicit route.
pub const WILDCARD: &str = "*";

/// Maps message types to the ordered transports they are sent to.
///
/// A type with no route (and no wildcard route) is handled synchronously
/// by the local handlers instead.
///
/// ## Example
///
/// ```
/// use messenger_rust::SendersLocator;
///
/// let senders = SendersLocator::new()
///     .route_name("app.hello", ["async", "audit"]);
///
/// assert_eq!(senders.senders_for("app.hello"), ["async", "audit"]);
/// assert!(senders.senders_for("app.other").is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct SendersLocator {
    routes: HashMap<String, Vec<String>>,
}

impl SendersLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route message type `M` to the given transports, in order.
    pub fn route<M: Message, I, S>(self, transports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.route_name(M::NAME, transports)
    }

    /// Route a message type by name. `"*"` routes every unrouted type.
    ///
    /// Transports are appended to any existing route, skipping duplicates.
    pub fn route_name<I, S>(mut self, message_type: impl Into<String>, transports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let route = self.routes.entry(message_type.into()).or_default();
        for transport in transports {
            let transport = transport.into();
            if !route.contains(&transport) {
                route.push(transport);
            }
        }
        self
    }

    /// Transport names for a message type; empty means "handle locally".
    pub fn senders_for(&self, message_type: &str) -> &[String] {
        self.routes
            .get(message_type)
            .or_else(|| self.routes.get(WILDCARD))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every transport name referenced by any route.
    pub fn transport_names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes.iter().flat_map(|(message_type, transports)| {
            transports
                .iter()
                .map(move |t| (message_type.as_str(), t.as_str()))
        })
    }
}
