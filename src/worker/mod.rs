//! Worker - consuming messages from receiver transports.
//!
//! A `Worker` polls one transport, dispatches each delivery through the
//! bus and then acknowledges it, re-sends it for a delayed retry, or
//! dead-letters it. `WorkerThread` and `Consumer` run workers in the
//! background.

mod options;
mod thread;
mod worker;

pub use options::WorkerOptions;
pub use thread::{Consumer, WorkerThread};
pub use worker::{Outcome, Worker, WorkerStats};
