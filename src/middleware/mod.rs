//! Middleware - the ordered stages every dispatch passes through.
//!
//! ```text
//! dispatch(msg) ─▶ [custom...] ─▶ SendMessageMiddleware ─▶ HandleMessageMiddleware
//!                                   │ routed?                 │ handlers in order
//!                                   ▼                         ▼
//!                              transports                 Ok(envelope)
//! ```

mod handle;
mod middleware;
mod send;
mod trace;

pub use handle::HandleMessageMiddleware;
pub use middleware::{from_fn, FnMiddleware, Middleware, Next};
pub use send::SendMessageMiddleware;
pub use trace::TraceMiddleware;
