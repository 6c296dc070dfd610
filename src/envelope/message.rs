//! Message trait and its type-erased form.

use std::any::Any;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::serializer::{Format, SerializationError};

/// An application-defined message.
///
/// `NAME` is the routing tag used by the senders and handlers locators and
/// the type name written on the wire. It must be unique per message type.
///
/// ## Example
///
/// ```
/// use messenger_rust::Message;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct Hello {
///     name: String,
/// }
///
/// impl Message for Hello {
///     const NAME: &'static str = "app.hello";
/// }
/// ```
pub trait Message: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    /// Routing and wire name for this message type.
    const NAME: &'static str;
}

/// Object-safe view over any `Message`, used inside envelopes.
pub trait AnyMessage: fmt::Debug + Send + Sync {
    /// The message's `Message::NAME`.
    fn name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    /// Encode the message body in the given format.
    fn encode(&self, format: Format) -> Result<Vec<u8>, SerializationError>;
}

impl<M: Message> AnyMessage for M {
    fn name(&self) -> &'static str {
        M::NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn encode(&self, format: Format) -> Result<Vec<u8>, SerializationError> {
        format.encode(M::NAME, self)
    }
}
