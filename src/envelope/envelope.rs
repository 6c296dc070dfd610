//! Envelope - a message plus its ordered stamps.

use std::fmt;
use std::sync::Arc;

use super::message::{AnyMessage, Message};
use super::stamp::{AnyStamp, Stamp};

/// The unit that flows through the middleware pipeline and the transports.
///
/// The message never changes after construction. Stamps are only ever
/// appended: `with()` consumes the envelope and returns a new value, so any
/// clone held elsewhere keeps seeing the stamps it was cloned with.
///
/// ## Example
///
/// ```
/// use messenger_rust::{Envelope, Message, RetryCount};
/// # use serde::{Deserialize, Serialize};
/// # #[derive(Debug, Serialize, Deserialize)]
/// # struct Hello { name: String }
/// # impl Message for Hello { const NAME: &'static str = "app.hello"; }
///
/// let original = Envelope::wrap(Hello { name: "Ada".into() });
/// let retried = original.clone().with(RetryCount(1));
///
/// assert!(original.last::<RetryCount>().is_none());
/// assert_eq!(retried.last::<RetryCount>(), Some(&RetryCount(1)));
/// ```
#[derive(Clone)]
pub struct Envelope {
    message: Arc<dyn AnyMessage>,
    stamps: Vec<Arc<dyn AnyStamp>>,
}

impl Envelope {
    /// Wrap a message with an empty stamp sequence.
    pub fn wrap<M: Message>(message: M) -> Self {
        Self {
            message: Arc::new(message),
            stamps: Vec::new(),
        }
    }

    /// Rebuild an envelope from already type-erased parts (used by decoders).
    pub fn from_parts(message: Arc<dyn AnyMessage>, stamps: Vec<Arc<dyn AnyStamp>>) -> Self {
        Self { message, stamps }
    }

    /// Return a new envelope with `stamp` appended.
    pub fn with<S: Stamp>(mut self, stamp: S) -> Self {
        self.stamps.push(Arc::new(stamp));
        self
    }

    /// Return a new envelope without any stamp of kind `S`.
    pub fn without_all<S: Stamp>(mut self) -> Self {
        self.stamps.retain(|stamp| !stamp.as_any().is::<S>());
        self
    }

    /// All stamps of kind `S`, oldest first.
    pub fn all<S: Stamp>(&self) -> Vec<&S> {
        self.stamps
            .iter()
            .filter_map(|stamp| stamp.as_any().downcast_ref::<S>())
            .collect()
    }

    /// The most recently added stamp of kind `S`.
    pub fn last<S: Stamp>(&self) -> Option<&S> {
        self.stamps
            .iter()
            .rev()
            .find_map(|stamp| stamp.as_any().downcast_ref::<S>())
    }

    /// Every stamp in insertion order.
    pub fn stamps(&self) -> &[Arc<dyn AnyStamp>] {
        &self.stamps
    }

    /// A copy that keeps only the stamps allowed to cross a transport.
    pub fn sendable(&self) -> Self {
        Self {
            message: Arc::clone(&self.message),
            stamps: self
                .stamps
                .iter()
                .filter(|stamp| stamp.sendable())
                .cloned()
                .collect(),
        }
    }

    pub fn message(&self) -> &dyn AnyMessage {
        self.message.as_ref()
    }

    /// Downcast the message to a concrete type.
    pub fn message_as<M: Message>(&self) -> Option<&M> {
        self.message.as_any().downcast_ref::<M>()
    }

    /// The message's routing name.
    pub fn message_name(&self) -> &'static str {
        self.message.name()
    }

    /// Whether both envelopes wrap the very same message value.
    pub fn same_message(&self, other: &Envelope) -> bool {
        Arc::ptr_eq(&self.message, &other.message)
    }
}

impl<M: Message> From<M> for Envelope {
    fn from(message: M) -> Self {
        Envelope::wrap(message)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("message", &self.message)
            .field("stamps", &self.stamps)
            .finish()
    }
}
