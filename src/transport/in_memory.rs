//! In-memory transport for testing and single-process scenarios.
//!
//! This module provides a thread-safe in-memory transport, useful for:
//! - Unit and integration testing without a broker
//! - Single-process applications that still want async handling
//! - Development and prototyping

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::error::TransportError;
use super::transport::{Receiver, Sender};
use crate::envelope::{DelayStamp, Envelope, TransportMessageId};
use crate::serializer::Serializer;

enum Stored {
    Envelope(Envelope),
    Encoded(Vec<u8>),
}

struct Queued {
    id: String,
    stored: Stored,
    /// `None` when the delay does not fit in an `Instant`: never due.
    available_at: Option<Instant>,
}

/// History kept only by recording transports.
#[derive(Default)]
struct History {
    sent: Vec<Envelope>,
    acked: Vec<Envelope>,
    rejected: Vec<Envelope>,
    undecodable: Vec<Vec<u8>>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    queue: VecDeque<Queued>,
    in_flight: HashMap<String, Envelope>,
    history: Option<History>,
}

/// In-memory transport.
///
/// Features:
/// - Thread-safe (clones share the same queue)
/// - Honours `DelayStamp`: delayed messages stay invisible until due
/// - Optionally round-trips every envelope through a `Serializer`
/// - Optionally records every envelope sent, acknowledged or rejected, for
///   assertions in tests (`recording`). Without it only queued and in-flight
///   deliveries are held, so long-running consumers stay bounded.
///
/// ## Example
///
/// ```
/// use messenger_rust::{Envelope, InMemoryTransport, Message, Receiver, Sender};
/// # use serde::{Deserialize, Serialize};
/// # #[derive(Debug, Serialize, Deserialize)]
/// # struct Hello { name: String }
/// # impl Message for Hello { const NAME: &'static str = "app.hello"; }
///
/// let transport = InMemoryTransport::recording();
/// transport.send(&Envelope::wrap(Hello { name: "Ada".into() })).unwrap();
///
/// let delivery = transport.get().unwrap().unwrap();
/// transport.ack(&delivery).unwrap();
/// assert_eq!(transport.acknowledged().len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<Mutex<State>>,
    serializer: Option<Serializer>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that keeps the full send / ack / reject history.
    pub fn recording() -> Self {
        Self::new().with_recording()
    }

    /// Encode on send and decode on get, as a real broker would.
    pub fn with_serializer(serializer: Serializer) -> Self {
        Self {
            state: Arc::default(),
            serializer: Some(serializer),
        }
    }

    /// Start keeping history; anything recorded before is discarded.
    pub fn with_recording(self) -> Self {
        if let Ok(mut state) = self.state("with_recording") {
            state.history = Some(History::default());
        }
        self
    }

    fn state(&self, operation: &'static str) -> Result<MutexGuard<'_, State>, TransportError> {
        self.state
            .lock()
            .map_err(|_| TransportError::LockPoisoned(operation))
    }

    pub fn is_recording(&self) -> bool {
        self.state("is_recording")
            .map(|s| s.history.is_some())
            .unwrap_or(false)
    }

    fn history<T>(&self, operation: &'static str, read: impl Fn(&History) -> Vec<T>) -> Vec<T> {
        self.state(operation)
            .ok()
            .and_then(|s| s.history.as_ref().map(&read))
            .unwrap_or_default()
    }

    /// Every envelope handed to `send`, in order. Empty unless recording.
    pub fn sent(&self) -> Vec<Envelope> {
        self.history("sent", |h| h.sent.clone())
    }

    /// Envelopes that were acknowledged. Empty unless recording.
    pub fn acknowledged(&self) -> Vec<Envelope> {
        self.history("acknowledged", |h| h.acked.clone())
    }

    /// Envelopes rejected without requeue. Frames dropped before they could
    /// be decoded are in `undecodable`. Empty unless recording.
    pub fn rejected(&self) -> Vec<Envelope> {
        self.history("rejected", |h| h.rejected.clone())
    }

    /// Raw frames that failed to decode and were dropped from the queue.
    /// Empty unless recording.
    pub fn undecodable(&self) -> Vec<Vec<u8>> {
        self.history("undecodable", |h| h.undecodable.clone())
    }

    /// Number of queued deliveries, due or not.
    pub fn pending(&self) -> usize {
        self.state("pending").map(|s| s.queue.len()).unwrap_or(0)
    }

    /// Number of delivered but not yet acked/rejected envelopes.
    pub fn in_flight(&self) -> usize {
        self.state("in_flight").map(|s| s.in_flight.len()).unwrap_or(0)
    }

    /// Clear all state (useful for test cleanup). A recording transport
    /// keeps recording.
    pub fn clear(&self) {
        if let Ok(mut state) = self.state("clear") {
            let recording = state.history.is_some();
            *state = State::default();
            if recording {
                state.history = Some(History::default());
            }
        }
    }
}

impl Sender for InMemoryTransport {
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let wire = envelope.sendable();
        let delay = wire
            .last::<DelayStamp>()
            .map(DelayStamp::delay)
            .unwrap_or(Duration::ZERO);

        let stored = match &self.serializer {
            Some(serializer) => Stored::Encoded(serializer.encode(&wire)?),
            None => Stored::Envelope(wire.clone()),
        };

        let mut state = self.state("send")?;
        state.next_id += 1;
        let id = state.next_id.to_string();
        state.queue.push_back(Queued {
            id,
            stored,
            available_at: Instant::now().checked_add(delay),
        });
        if let Some(history) = state.history.as_mut() {
            history.sent.push(wire);
        }
        Ok(())
    }
}

impl Receiver for InMemoryTransport {
    fn get(&self) -> Result<Option<Envelope>, TransportError> {
        let mut state = self.state("get")?;
        let now = Instant::now();

        let Some(position) = state
            .queue
            .iter()
            .position(|q| q.available_at.is_some_and(|at| at <= now))
        else {
            return Ok(None);
        };
        let Some(queued) = state.queue.remove(position) else {
            return Ok(None);
        };

        let envelope = match (queued.stored, &self.serializer) {
            (Stored::Envelope(envelope), _) => envelope,
            (Stored::Encoded(bytes), Some(serializer)) => match serializer.decode(&bytes) {
                Ok(envelope) => envelope,
                Err(err) => {
                    if let Some(history) = state.history.as_mut() {
                        history.undecodable.push(bytes);
                    }
                    return Err(err.into());
                }
            },
            (Stored::Encoded(_), None) => {
                return Err(TransportError::Rejected(format!(
                    "delivery {} is encoded but no serializer is configured",
                    queued.id
                )))
            }
        };

        let envelope = envelope.with(TransportMessageId::new(queued.id.clone()));
        state.in_flight.insert(queued.id, envelope.clone());
        Ok(Some(envelope))
    }

    fn ack(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let id = delivery_id(envelope)?;
        let mut state = self.state("ack")?;
        let delivered = state
            .in_flight
            .remove(&id)
            .ok_or(TransportError::UnknownDelivery(id))?;
        if let Some(history) = state.history.as_mut() {
            history.acked.push(delivered);
        }
        Ok(())
    }

    fn reject(&self, envelope: &Envelope, requeue: bool) -> Result<(), TransportError> {
        let id = delivery_id(envelope)?;
        let mut state = self.state("reject")?;
        let delivered = state
            .in_flight
            .remove(&id)
            .ok_or_else(|| TransportError::UnknownDelivery(id.clone()))?;

        if requeue {
            state.queue.push_front(Queued {
                id,
                stored: Stored::Envelope(delivered.without_all::<TransportMessageId>()),
                available_at: Some(Instant::now()),
            });
        } else if let Some(history) = state.history.as_mut() {
            history.rejected.push(delivered);
        }
        Ok(())
    }
}

fn delivery_id(envelope: &Envelope) -> Result<String, TransportError> {
    envelope
        .last::<TransportMessageId>()
        .map(|stamp| stamp.id.clone())
        .ok_or_else(|| TransportError::UnknownDelivery("envelope has no transport message id".into()))
}
