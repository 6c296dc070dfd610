//! Worker options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning and stop conditions for a consumer loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerOptions {
    /// Sleep between polls that found nothing.
    #[serde(with = "millis", rename = "idle_sleep_ms")]
    pub idle_sleep: Duration,

    /// Upper bound for the backoff after consecutive polling errors.
    #[serde(with = "millis", rename = "max_backoff_ms")]
    pub max_backoff: Duration,

    /// Stop after this many processed messages.
    pub message_limit: Option<usize>,

    /// Stop after running this long.
    #[serde(with = "millis_opt", rename = "time_limit_ms")]
    pub time_limit: Option<Duration>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            idle_sleep: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            message_limit: None,
            time_limit: None,
        }
    }
}

impl WorkerOptions {
    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn with_message_limit(mut self, limit: usize) -> Self {
        self.message_limit = Some(limit);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Backoff after `failures` consecutive polling errors:
    /// `idle_sleep * 2^(failures-1)`, capped at `max_backoff`.
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.idle_sleep
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod millis_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_some(&(value.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
