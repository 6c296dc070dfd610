//! Handler trait for typed messages.

use super::error::HandlerError;
use crate::envelope::Message;

/// Processes one message type synchronously.
///
/// Handlers may run more than once for the same message (at-least-once
/// delivery), so they should be idempotent.
///
/// Closures `Fn(&M) -> Result<(), HandlerError>` are handlers; structs that
/// carry injected collaborators implement the trait directly:
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use messenger_rust::{Handler, HandlerError, Message};
/// # use serde::{Deserialize, Serialize};
/// # #[derive(Debug, Serialize, Deserialize)]
/// # struct Hello { name: String }
/// # impl Message for Hello { const NAME: &'static str = "app.hello"; }
///
/// struct Greeter {
///     output: Arc<Mutex<Vec<String>>>,
/// }
///
/// impl Handler<Hello> for Greeter {
///     fn handle(&self, message: &Hello) -> Result<(), HandlerError> {
///         self.output
///             .lock()
///             .map_err(|_| HandlerError::Unrecoverable("output poisoned".into()))?
///             .push(format!("Hello {}!", message.name));
///         Ok(())
///     }
/// }
/// ```
pub trait Handler<M: Message>: Send + Sync {
    fn handle(&self, message: &M) -> Result<(), HandlerError>;
}

impl<M, F> Handler<M> for F
where
    M: Message,
    F: Fn(&M) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, message: &M) -> Result<(), HandlerError> {
        self(message)
    }
}
