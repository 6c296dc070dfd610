//! Handlers locator - message type -> ordered handlers.
//!
//! ## Example
//!
//! ```
//! use messenger_rust::{HandlersLocator, Message};
//! # use serde::{Deserialize, Serialize};
//! # #[derive(Debug, Serialize, Deserialize)]
//! # struct Hello { name: String }
//! # impl Message for Hello { const NAME: &'static str = "app.hello"; }
//!
//! let handlers = HandlersLocator::new()
//!     .handler(|msg: &Hello| {
//!         println!("Hello {}!", msg.name);
//!         Ok(())
//!     })
//!     .named_handler("audit", |_msg: &Hello| Ok(()));
//!
//! assert_eq!(handlers.handlers_for("app.hello").len(), 2);
//! ```

use std::collections::HashMap;
use std::fmt;

use super::error::HandlerError;
use super::handler::Handler;
use crate::envelope::{AnyMessage, Message};

type ErasedHandler = Box<dyn Fn(&dyn AnyMessage) -> Result<(), HandlerError> + Send + Sync>;

/// A registered handler with the name used in logs and `HandledStamp`s.
pub struct HandlerDescriptor {
    name: String,
    handle: ErasedHandler,
}

impl HandlerDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the handler with a type-erased message.
    pub fn call(&self, message: &dyn AnyMessage) -> Result<(), HandlerError> {
        (self.handle)(message)
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Maps message type names to handlers, kept in registration order.
#[derive(Debug, Default)]
pub struct HandlersLocator {
    handlers: HashMap<&'static str, Vec<HandlerDescriptor>>,
}

impl HandlersLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `M`, named after its Rust type.
    ///
    /// Returns `self` for chaining.
    pub fn handler<M, H>(self, handler: H) -> Self
    where
        M: Message,
        H: Handler<M> + 'static,
    {
        let name = std::any::type_name::<H>().to_string();
        self.named_handler(name, handler)
    }

    /// Register a handler for `M` under an explicit name.
    pub fn named_handler<M, H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        M: Message,
        H: Handler<M> + 'static,
    {
        let handle: ErasedHandler = Box::new(move |message: &dyn AnyMessage| {
            let message = message.as_any().downcast_ref::<M>().ok_or_else(|| {
                HandlerError::Unrecoverable(format!(
                    "message \"{}\" is not a {}",
                    message.name(),
                    std::any::type_name::<M>()
                ))
            })?;
            handler.handle(message)
        });

        self.handlers
            .entry(M::NAME)
            .or_default()
            .push(HandlerDescriptor {
                name: name.into(),
                handle,
            });
        self
    }

    /// Handlers for a message type, in registration order.
    pub fn handlers_for(&self, message_type: &str) -> &[HandlerDescriptor] {
        self.handlers
            .get(message_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Message types with at least one handler.
    pub fn message_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }
}
