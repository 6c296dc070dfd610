//! Message bus and worker runtime.
//!
//! Messages are wrapped in stamped envelopes and dispatched through a
//! middleware chain. The send stage hands routed messages to transports;
//! the handle stage calls the handlers registered for the message type.
//! Workers consume transports, dispatch what they receive through the same
//! bus, and acknowledge, retry with a delay, or dead-letter each delivery.
//!
//! ```
//! use messenger_rust::{HandlersLocator, Message, MessageBus};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Hello { name: String }
//!
//! impl Message for Hello {
//!     const NAME: &'static str = "app.hello";
//! }
//!
//! let bus = MessageBus::builder()
//!     .handlers(HandlersLocator::new().handler(|msg: &Hello| {
//!         println!("Hello {}!", msg.name);
//!         Ok(())
//!     }))
//!     .build()
//!     .unwrap();
//!
//! bus.dispatch(Hello { name: "Ada".into() }).unwrap();
//! ```

pub mod bus;
pub mod config;
pub mod envelope;
pub mod handler;
pub mod middleware;
pub mod retry;
pub mod serializer;
pub mod transport;
pub mod worker;

pub use bus::{BusError, MessageBus, MessageBusBuilder};
pub use config::{ConfigError, Messenger, MessengerBuilder, MessengerConfig, RetrySetting, TransportConfig};
pub use envelope::{
    DelayStamp, Envelope, ErrorDetails, HandledStamp, Message, ReceivedTransport, RetryCount,
    SentStamp, Stamp, TransportMessageId,
};
pub use handler::{Handler, HandlerError, HandlersLocator};
pub use middleware::{Middleware, Next, TraceMiddleware};
pub use retry::{MultiplierRetryStrategy, RetryStrategy};
pub use serializer::{Format, SerializationError, Serializer};
pub use transport::{
    FilesystemTransport, InMemoryTransport, Receiver, Sender, SendersLocator, Transport,
    TransportError, TransportLocator,
};
pub use worker::{Consumer, Outcome, Worker, WorkerOptions, WorkerStats, WorkerThread};
