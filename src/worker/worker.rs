//! Worker - the consumer loop for one receiver transport.

use std::sync::mpsc::{Receiver as StopReceiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::options::WorkerOptions;
use crate::bus::{BusError, MessageBus};
use crate::envelope::{
    DelayStamp, Envelope, ErrorDetails, HandledStamp, ReceivedTransport, RetryCount,
    TransportMessageId,
};
use crate::retry::RetryStrategy;
use crate::transport::{Transport, TransportError};

/// Result of one poll / process cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was available.
    Idle,
    /// Handled and acknowledged.
    Acknowledged,
    /// Rejected and re-sent with a delay; `retry_count` is the new count.
    Retried { retry_count: u32, delay: Duration },
    /// Rejected for good.
    DeadLettered,
    /// The transport failed while polling, acking or rejecting.
    TransportFailed,
}

/// Statistics from a worker.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub messages_handled: usize,
    pub messages_retried: usize,
    pub messages_dead_lettered: usize,
    pub transport_errors: usize,
    pub polls: usize,
}

impl WorkerStats {
    fn record(&mut self, outcome: Outcome) {
        self.polls += 1;
        match outcome {
            Outcome::Idle => {}
            Outcome::Acknowledged => self.messages_handled += 1,
            Outcome::Retried { .. } => self.messages_retried += 1,
            Outcome::DeadLettered => self.messages_dead_lettered += 1,
            Outcome::TransportFailed => self.transport_errors += 1,
        }
    }

    /// Messages that reached a final or retry decision.
    pub fn processed(&self) -> usize {
        self.messages_handled + self.messages_retried + self.messages_dead_lettered
    }
}

/// Consumer loop for a single receiver transport.
///
/// Each cycle polls once; a delivery is dispatched through the bus and then
/// acknowledged, re-sent for retry, or dead-lettered. Processing is fully
/// synchronous: the next poll only happens after the previous message is
/// settled.
///
/// ## Example
///
/// ```ignore
/// let mut worker = Worker::new(bus, "async", transport)
///     .with_retry_strategy(Arc::new(MultiplierRetryStrategy::default()));
///
/// match worker.process_next() {
///     Outcome::Acknowledged => { /* handled */ }
///     other => println!("{:?}", other),
/// }
/// ```
pub struct Worker {
    bus: Arc<MessageBus>,
    transport_name: String,
    transport: Arc<dyn Transport>,
    retry: Option<Arc<dyn RetryStrategy>>,
    failure: Option<(String, Arc<dyn Transport>)>,
    options: WorkerOptions,
    consecutive_failures: u32,
}

impl Worker {
    pub fn new(
        bus: Arc<MessageBus>,
        transport_name: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            bus,
            transport_name: transport_name.into(),
            transport,
            retry: None,
            failure: None,
            options: WorkerOptions::default(),
            consecutive_failures: 0,
        }
    }

    /// Retry failed deliveries with this strategy. Without one, the first
    /// failure is final.
    pub fn with_retry_strategy(mut self, strategy: Arc<dyn RetryStrategy>) -> Self {
        self.retry = Some(strategy);
        self
    }

    /// Also send dead-lettered envelopes to this transport.
    pub fn with_failure_transport(
        mut self,
        name: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        self.failure = Some((name.into(), transport));
        self
    }

    pub fn with_options(mut self, options: WorkerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn transport_name(&self) -> &str {
        &self.transport_name
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    /// Poll once and settle whatever was received. Never sleeps.
    pub fn process_next(&mut self) -> Outcome {
        let envelope = match self.transport.get() {
            Ok(Some(envelope)) => {
                self.consecutive_failures = 0;
                envelope
            }
            Ok(None) => {
                self.consecutive_failures = 0;
                return Outcome::Idle;
            }
            Err(TransportError::Serialization(err)) => {
                // The transport has already discarded the undecodable delivery.
                self.consecutive_failures = 0;
                error!(
                    event = "dead-lettered",
                    transport = %self.transport_name,
                    error = %err,
                    "undecodable message dead-lettered"
                );
                return Outcome::DeadLettered;
            }
            Err(err) => {
                self.consecutive_failures += 1;
                warn!(
                    transport = %self.transport_name,
                    failures = self.consecutive_failures,
                    error = %err,
                    "polling failed"
                );
                return Outcome::TransportFailed;
            }
        };

        let envelope = envelope.with(ReceivedTransport::new(self.transport_name.as_str()));
        let message_type = envelope.message_name();
        let retry_count = current_retry_count(&envelope);

        info!(
            event = "started",
            message_type,
            transport = %self.transport_name,
            retry_count,
            "processing message"
        );

        match self.bus.dispatch(envelope.clone()) {
            Ok(_) => match self.transport.ack(&envelope) {
                Ok(()) => {
                    info!(
                        event = "succeeded",
                        message_type,
                        transport = %self.transport_name,
                        retry_count,
                        "message handled"
                    );
                    Outcome::Acknowledged
                }
                Err(err) => {
                    error!(
                        message_type,
                        transport = %self.transport_name,
                        error = %err,
                        "ack failed; message may be redelivered"
                    );
                    Outcome::TransportFailed
                }
            },
            Err(err) => self.handle_failure(envelope, err, retry_count),
        }
    }

    fn handle_failure(&self, envelope: Envelope, err: BusError, retry_count: u32) -> Outcome {
        let message_type = envelope.message_name();
        let strategy = self.retry.as_ref().filter(|_| err.is_retryable());

        if let Err(reject_err) = self.transport.reject(&envelope, false) {
            error!(
                message_type,
                transport = %self.transport_name,
                error = %reject_err,
                "reject failed"
            );
            return Outcome::TransportFailed;
        }

        let details = ErrorDetails {
            kind: err.kind().to_string(),
            message: err.to_string(),
        };

        match strategy {
            Some(strategy) if strategy.should_retry(retry_count) => {
                let delay = strategy.delay_for(retry_count);
                let next_count = retry_count + 1;
                let retry = strip_delivery_stamps(envelope)
                    .with(RetryCount(next_count))
                    .with(DelayStamp::new(delay))
                    .with(details);

                if let Err(send_err) = self.transport.send(&retry) {
                    error!(
                        message_type,
                        transport = %self.transport_name,
                        retry_count = next_count,
                        error = %send_err,
                        "re-send for retry failed; message lost"
                    );
                    return Outcome::TransportFailed;
                }

                warn!(
                    event = "retried",
                    message_type,
                    transport = %self.transport_name,
                    retry_count = next_count,
                    delay_ms = DelayStamp::new(delay).delay_ms,
                    error = %err,
                    "message scheduled for retry"
                );
                Outcome::Retried {
                    retry_count: next_count,
                    delay,
                }
            }
            _ => {
                error!(
                    event = "dead-lettered",
                    message_type,
                    transport = %self.transport_name,
                    retry_count,
                    error = %err,
                    "message dead-lettered"
                );
                self.forward_to_failure_transport(envelope, details);
                Outcome::DeadLettered
            }
        }
    }

    fn forward_to_failure_transport(&self, envelope: Envelope, details: ErrorDetails) {
        let Some((name, transport)) = &self.failure else {
            return;
        };
        if name == &self.transport_name {
            return;
        }

        let failed = strip_delivery_stamps(envelope).with(details);
        match transport.send(&failed) {
            Ok(()) => debug!(
                message_type = failed.message_name(),
                failure_transport = %name,
                "forwarded to failure transport"
            ),
            Err(err) => error!(
                message_type = failed.message_name(),
                failure_transport = %name,
                error = %err,
                "failed to forward to failure transport"
            ),
        }
    }

    /// Run until `stop` fires, its sender is dropped, or a limit in the
    /// options is reached.
    ///
    /// The stop signal is only observed between cycles, so a message being
    /// processed is always settled before the loop exits.
    pub fn run(&mut self, stop: &StopReceiver<()>) -> WorkerStats {
        let mut stats = WorkerStats::default();
        let started = Instant::now();

        info!(transport = %self.transport_name, "worker started");

        loop {
            if self.limit_reached(&stats, started) {
                break;
            }

            let outcome = self.process_next();
            stats.record(outcome);

            let pause = match outcome {
                Outcome::Idle => self.options.idle_sleep,
                Outcome::TransportFailed if self.consecutive_failures > 0 => {
                    self.options.backoff(self.consecutive_failures)
                }
                _ => Duration::ZERO,
            };

            match stop.recv_timeout(pause) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }

        info!(
            transport = %self.transport_name,
            handled = stats.messages_handled,
            retried = stats.messages_retried,
            dead_lettered = stats.messages_dead_lettered,
            "worker stopped"
        );
        stats
    }

    fn limit_reached(&self, stats: &WorkerStats, started: Instant) -> bool {
        if let Some(limit) = self.options.message_limit {
            if stats.processed() >= limit {
                info!(transport = %self.transport_name, limit, "message limit reached");
                return true;
            }
        }
        if let Some(limit) = self.options.time_limit {
            if started.elapsed() >= limit {
                info!(transport = %self.transport_name, "time limit reached");
                return true;
            }
        }
        false
    }
}

fn current_retry_count(envelope: &Envelope) -> u32 {
    envelope.last::<RetryCount>().map(|stamp| stamp.0).unwrap_or(0)
}

/// Drop the stamps that describe the previous delivery before re-sending.
fn strip_delivery_stamps(envelope: Envelope) -> Envelope {
    envelope
        .without_all::<ReceivedTransport>()
        .without_all::<TransportMessageId>()
        .without_all::<HandledStamp>()
        .without_all::<DelayStamp>()
}
