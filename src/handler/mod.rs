//! Handlers - typed message processing and the locator that finds it.

mod error;
mod handler;
mod locator;

pub use error::HandlerError;
pub use handler::Handler;
pub use locator::{HandlerDescriptor, HandlersLocator};
