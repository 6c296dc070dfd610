//! Middleware trait and the continuation that drives the chain.

use std::sync::Arc;

use crate::bus::BusError;
use crate::envelope::Envelope;

/// One stage of the dispatch pipeline.
///
/// A stage may inspect or stamp the envelope, call `next.run(envelope)` to
/// continue, or return without calling it to stop the chain. `Next::run`
/// takes `self`, so the rest of the chain runs at most once per stage.
pub trait Middleware: Send + Sync {
    fn handle(&self, envelope: Envelope, next: Next<'_>) -> Result<Envelope, BusError>;
}

/// Middleware built from a closure, see [`from_fn`].
pub struct FnMiddleware<F>(F);

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(Envelope, Next<'a>) -> Result<Envelope, BusError> + Send + Sync,
{
    fn handle(&self, envelope: Envelope, next: Next<'_>) -> Result<Envelope, BusError> {
        (self.0)(envelope, next)
    }
}

/// Turn a closure into a middleware stage.
///
/// ```
/// use messenger_rust::middleware::from_fn;
///
/// let passthrough = from_fn(|envelope, next| next.run(envelope));
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(Envelope, Next<'a>) -> Result<Envelope, BusError> + Send + Sync,
{
    FnMiddleware(f)
}

/// The remainder of the chain after the current stage.
pub struct Next<'a> {
    rest: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(rest: &'a [Arc<dyn Middleware>]) -> Self {
        Self { rest }
    }

    /// Pass the envelope to the next stage. At the end of the chain the
    /// envelope is returned as the dispatch result.
    pub fn run(self, envelope: Envelope) -> Result<Envelope, BusError> {
        match self.rest.split_first() {
            Some((stage, rest)) => stage.handle(envelope, Next::new(rest)),
            None => Ok(envelope),
        }
    }

    /// Number of stages still ahead.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}
