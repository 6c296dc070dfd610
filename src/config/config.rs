//! Declarative messenger configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::ConfigError;
use crate::retry::{InvalidMultiplier, MultiplierRetryStrategy};
use crate::serializer::Format;
use crate::worker::WorkerOptions;

/// Messenger configuration, usually loaded from JSON.
///
/// ```json
/// {
///   "transports": {
///     "async":  { "dsn": "file:///var/spool/app", "retry_strategy": { "max_retries": 5 } },
///     "sync":   { "dsn": "in-memory://", "retry_strategy": null },
///     "failed": { "dsn": "file:///var/spool/app-failed" }
///   },
///   "routing": { "app.hello": ["async"], "*": ["sync"] },
///   "failure_transport": "failed",
///   "serializer": "json",
///   "worker": { "idle_sleep_ms": 500 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MessengerConfig {
    pub transports: BTreeMap<String, TransportConfig>,
    /// Message type name (or `"*"`) -> transport names.
    pub routing: BTreeMap<String, Vec<String>>,
    /// Transport that receives dead-lettered messages.
    pub failure_transport: Option<String>,
    pub serializer: Format,
    pub worker: WorkerOptions,
    /// Let the handle stage accept messages nobody handles.
    pub allow_no_handlers: bool,
}

impl MessengerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Check that every referenced transport is declared.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (message_type, names) in &self.routing {
            for name in names {
                self.require_transport(name, || format!("routing for \"{}\"", message_type))?;
            }
        }
        if let Some(name) = &self.failure_transport {
            self.require_transport(name, || "failure_transport".to_string())?;
        }
        Ok(())
    }

    fn require_transport(
        &self,
        name: &str,
        referenced_by: impl FnOnce() -> String,
    ) -> Result<(), ConfigError> {
        if self.transports.contains_key(name) {
            Ok(())
        } else {
            Err(ConfigError::UnknownTransport {
                name: name.to_string(),
                referenced_by: referenced_by(),
            })
        }
    }
}

/// One named transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    pub dsn: String,
    #[serde(default, skip_serializing_if = "RetrySetting::is_default")]
    pub retry_strategy: RetrySetting,
}

impl TransportConfig {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            retry_strategy: RetrySetting::Default,
        }
    }

    pub fn with_retry(mut self, retry_strategy: RetrySetting) -> Self {
        self.retry_strategy = retry_strategy;
        self
    }
}

/// Retry policy of a transport.
///
/// In JSON: a missing key is `Default`, `null` is `Disabled`, and an object
/// is `Custom`.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RetrySetting {
    #[default]
    Default,
    Disabled,
    Custom(RetryConfig),
}

impl RetrySetting {
    fn is_default(&self) -> bool {
        matches!(self, RetrySetting::Default)
    }

    /// The strategy to install, or `None` when retries are disabled.
    pub fn strategy(&self) -> Result<Option<MultiplierRetryStrategy>, InvalidMultiplier> {
        match self {
            RetrySetting::Default => Ok(Some(MultiplierRetryStrategy::default())),
            RetrySetting::Disabled => Ok(None),
            RetrySetting::Custom(config) => config.strategy().map(Some),
        }
    }
}

impl Serialize for RetrySetting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RetrySetting::Default => RetryConfig::default().serialize(serializer),
            RetrySetting::Disabled => serializer.serialize_none(),
            RetrySetting::Custom(config) => config.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for RetrySetting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<RetryConfig>::deserialize(deserializer)? {
            Some(config) => RetrySetting::Custom(config),
            None => RetrySetting::Disabled,
        })
    }
}

/// Parameters of a `MultiplierRetryStrategy`; omitted fields take the
/// strategy defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: None,
        }
    }
}

impl RetryConfig {
    pub fn strategy(&self) -> Result<MultiplierRetryStrategy, InvalidMultiplier> {
        MultiplierRetryStrategy::new(
            self.max_retries,
            Duration::from_millis(self.delay_ms),
            self.multiplier,
            self.max_delay_ms.map(Duration::from_millis),
        )
    }
}
