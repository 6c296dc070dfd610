//! Retry - per-transport policies for failed deliveries.

mod strategy;

pub use strategy::{InvalidMultiplier, MultiplierRetryStrategy, RetryStrategy};
