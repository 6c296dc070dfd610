//! Transports - the boundary to concrete message brokers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Transport (Sender + Receiver)               │
//! │  Sender:   send(envelope)                                   │
//! │  Receiver: get() / ack(envelope) / reject(envelope, requeue)│
//! └─────────────────────────────────────────────────────────────┘
//!          │                  │                     │
//!          ▼                  ▼                     ▼
//! ┌─────────────────┐ ┌───────────────────┐ ┌─────────────────────┐
//! │InMemoryTransport│ │FilesystemTransport│ │ AMQP / Redis / ...  │
//! │   (included)    │ │    (included)     │ │    (external)       │
//! └─────────────────┘ └───────────────────┘ └─────────────────────┘
//! ```
//!
//! `TransportLocator` resolves names to instances, `SendersLocator` maps
//! message types to names, and `TransportFactory` builds instances from DSNs.

mod error;
mod factory;
mod filesystem;
mod in_memory;
mod locator;
mod senders;
mod transport;

pub use error::TransportError;
pub use factory::{
    create_transport, default_factories, FilesystemTransportFactory, InMemoryTransportFactory,
    TransportFactory,
};
pub use filesystem::FilesystemTransport;
pub use in_memory::InMemoryTransport;
pub use locator::TransportLocator;
pub use senders::{SendersLocator, WILDCARD};
pub use transport::{Receiver, Sender, Transport};
