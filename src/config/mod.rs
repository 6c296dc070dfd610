//! Configuration - declaring transports, routing and retry policies, and
//! assembling them into a `Messenger`.

mod config;
mod error;
mod messenger;

pub use config::{MessengerConfig, RetryConfig, RetrySetting, TransportConfig};
pub use error::ConfigError;
pub use messenger::{Messenger, MessengerBuilder};
