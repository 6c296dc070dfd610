//! Serialization boundary between envelopes and transport bytes.

mod error;
mod format;
mod serializer;

pub use error::SerializationError;
pub use format::Format;
pub use serializer::Serializer;
