//! Message Bus - dispatching messages through the middleware chain.
//!
//! ## Data flow
//!
//! ```text
//! producer ─▶ MessageBus::dispatch ─▶ Send stage ─▶ Transport ···
//!                                                          ···▶ Worker ─▶ MessageBus::dispatch
//!                                                                          ─▶ Handle stage ─▶ handlers
//! ```
//!
//! The same bus serves both sides: a freshly dispatched message with a
//! route is sent, while an envelope carrying a `ReceivedTransport` stamp
//! passes the send stage untouched and is handled locally.

mod bus;
mod error;

pub use bus::{MessageBus, MessageBusBuilder};
pub use error::BusError;
