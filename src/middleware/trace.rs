//! Trace stage - logs every dispatch with its outcome and duration.

use std::time::Instant;

use tracing::{debug, warn};

use super::middleware::{Middleware, Next};
use crate::bus::BusError;
use crate::envelope::{Envelope, ReceivedTransport};

/// Emits a `debug!` event per dispatch and a `warn!` when it fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct TraceMiddleware;

impl Middleware for TraceMiddleware {
    fn handle(&self, envelope: Envelope, next: Next<'_>) -> Result<Envelope, BusError> {
        let message_type = envelope.message_name();
        let received_from = envelope
            .last::<ReceivedTransport>()
            .map(|stamp| stamp.name.clone());
        let started = Instant::now();

        let result = next.run(envelope);
        let elapsed_us = started.elapsed().as_micros() as u64;

        match &result {
            Ok(_) => debug!(message_type, ?received_from, elapsed_us, "dispatched"),
            Err(err) => warn!(message_type, ?received_from, elapsed_us, error = %err, "dispatch failed"),
        }
        result
    }
}
