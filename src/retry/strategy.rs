//! Retry strategies - when to retry a failed delivery, and how long to wait.

use std::fmt;
use std::time::Duration;

/// Stateless per-transport retry policy.
///
/// The retry count lives in the envelope's `RetryCount` stamps; the strategy
/// only maps a count to a decision and a delay.
pub trait RetryStrategy: fmt::Debug + Send + Sync {
    /// Whether a delivery that has already been retried `retry_count` times
    /// may be retried again.
    fn should_retry(&self, retry_count: u32) -> bool;

    /// How long to hold back the next attempt.
    fn delay_for(&self, retry_count: u32) -> Duration;
}

/// `delay * multiplier ^ retry_count`, optionally capped at `max_delay`.
///
/// With `multiplier >= 1.0` delays never decrease from one attempt to the next.
///
/// ```
/// use std::time::Duration;
/// use messenger_rust::{MultiplierRetryStrategy, RetryStrategy};
///
/// let strategy = MultiplierRetryStrategy::new(3, Duration::from_millis(100), 2.0, None).unwrap();
/// assert_eq!(strategy.delay_for(0), Duration::from_millis(100));
/// assert_eq!(strategy.delay_for(2), Duration::from_millis(400));
/// assert!(strategy.should_retry(2));
/// assert!(!strategy.should_retry(3));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct MultiplierRetryStrategy {
    max_retries: u32,
    delay: Duration,
    multiplier: f64,
    max_delay: Option<Duration>,
}

/// The multiplier would make delays shrink (or is not a number).
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("retry multiplier must be a finite number >= 1.0, got {0}")]
pub struct InvalidMultiplier(pub f64);

impl Default for MultiplierRetryStrategy {
    /// 3 retries, starting at one second, doubling, uncapped.
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: None,
        }
    }
}

impl MultiplierRetryStrategy {
    pub fn new(
        max_retries: u32,
        delay: Duration,
        multiplier: f64,
        max_delay: Option<Duration>,
    ) -> Result<Self, InvalidMultiplier> {
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(InvalidMultiplier(multiplier));
        }
        Ok(Self {
            max_retries,
            delay,
            multiplier,
            max_delay,
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl RetryStrategy for MultiplierRetryStrategy {
    fn should_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }

    fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = self.multiplier.powi(retry_count.min(i32::MAX as u32) as i32);
        let secs = self.delay.as_secs_f64() * factor;
        let cap = self.max_delay.unwrap_or(Duration::MAX);

        // try_from_secs_f64 fails on overflow; saturate to the cap instead.
        Duration::try_from_secs_f64(secs)
            .map(|delay| delay.min(cap))
            .unwrap_or(cap)
    }
}
