//! Envelope - messages and the stamps that travel with them.
//!
//! ```text
//! Envelope
//! ├── message: Arc<dyn AnyMessage>   (never changes)
//! └── stamps:  [RetryCount(1), SentStamp { .. }, ...]   (append-only)
//! ```

mod envelope;
mod message;
mod stamp;

pub use envelope::Envelope;
pub use message::{AnyMessage, Message};
pub use stamp::{
    AnyStamp, DelayStamp, ErrorDetails, HandledStamp, ReceivedTransport, RetryCount, SentStamp,
    Stamp, TransportMessageId,
};
