//! Re-activation backoff policy.
//!
//! When the publisher reports a retryable fault, or an activation request
//! times out, the protocol state machine schedules a re-activation after a
//! delay keyed by the number of consecutive failed attempts. The policy is
//! pluggable: [`BackoffStrategy::Never`] disables delay-retry entirely, and
//! attempt exhaustion is expressed by [`RetryPolicy::delay_for`] returning
//! `None`, which the state machine escalates to the terminal error state.
//!
//! # Example
//!
//! ```
//! use sirocco_engine::retry::{BackoffStrategy, RetryConfig, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(RetryConfig {
//!     max_attempts: 3,
//!     initial_delay: Duration::from_millis(100),
//!     max_delay: Duration::from_secs(10),
//!     strategy: BackoffStrategy::Exponential { multiplier: 2.0 },
//! });
//!
//! assert_eq!(policy.delay_for(1), Some(Duration::from_millis(100)));
//! assert_eq!(policy.delay_for(2), Some(Duration::from_millis(200)));
//! assert_eq!(policy.delay_for(3), Some(Duration::from_millis(400)));
//! assert_eq!(policy.delay_for(4), None); // exhausted
//! ```

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// How the delay grows with consecutive failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// No delay-retry at all; every retryable failure escalates to error.
    Never,
    /// The same delay for every attempt.
    Fixed,
    /// Linear growth: `initial + (attempt - 1) * increment`.
    Linear {
        /// Amount added per further attempt, in milliseconds.
        increment_ms: u64,
    },
    /// Exponential growth: `initial * multiplier ^ (attempt - 1)`.
    Exponential {
        /// Multiplier per further attempt (typically 2.0).
        multiplier: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential { multiplier: 2.0 }
    }
}

/// Configuration for the re-activation backoff policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Consecutive failed attempts after which retry gives up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first re-activation.
    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Upper bound on any computed delay.
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
    /// Growth strategy.
    #[serde(default)]
    pub strategy: BackoffStrategy,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(250)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            strategy: BackoffStrategy::default(),
        }
    }
}

impl RetryConfig {
    /// Sets the maximum attempt count.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the growth strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Computes re-activation delays from consecutive-attempt counts.
///
/// The policy is deliberately deterministic: the engine's clock is injected
/// through `tick()`, and deterministic delays keep every retry path
/// reproducible under test.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a policy from a configuration.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Creates a policy with the default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Creates a policy that never delay-retries.
    ///
    /// Every retryable failure then escalates straight to the terminal
    /// error state.
    #[must_use]
    pub fn never() -> Self {
        Self::new(RetryConfig::default().with_strategy(BackoffStrategy::Never))
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns the delay before re-activation attempt `attempt` (1-indexed
    /// count of consecutive failures), or `None` when retry is exhausted or
    /// disabled.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if matches!(self.config.strategy, BackoffStrategy::Never) {
            return None;
        }
        if attempt > self.config.max_attempts {
            return None;
        }
        if attempt == 0 {
            return Some(Duration::ZERO);
        }

        let initial_ms = self.config.initial_delay.as_millis() as f64;
        let delay_ms = match self.config.strategy {
            BackoffStrategy::Never => unreachable!("handled above"),
            BackoffStrategy::Fixed => initial_ms,
            BackoffStrategy::Linear { increment_ms } => {
                initial_ms + f64::from(attempt - 1) * increment_ms as f64
            }
            BackoffStrategy::Exponential { multiplier } => {
                initial_ms * multiplier.powi(attempt as i32 - 1)
            }
        };

        let delay = Duration::from_millis(delay_ms as u64).min(self.config.max_delay);
        debug!(
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            "computed re-activation delay"
        );
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_table() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            strategy: BackoffStrategy::Exponential { multiplier: 2.0 },
        });

        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(400)));
        assert_eq!(policy.delay_for(4), Some(Duration::from_millis(800)));
        assert_eq!(policy.delay_for(5), Some(Duration::from_millis(1600)));
        assert_eq!(policy.delay_for(6), None);
    }

    #[test]
    fn test_linear_table() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 4,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            strategy: BackoffStrategy::Linear { increment_ms: 150 },
        });

        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(400)));
    }

    #[test]
    fn test_fixed_table() {
        let policy = RetryPolicy::new(
            RetryConfig::default()
                .with_strategy(BackoffStrategy::Fixed)
                .with_initial_delay(Duration::from_millis(500))
                .with_max_attempts(3),
        );

        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(4), None);
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            strategy: BackoffStrategy::Exponential { multiplier: 2.0 },
        });

        assert_eq!(policy.delay_for(4), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(10), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_never_disables_retry() {
        let policy = RetryPolicy::never();
        assert_eq!(policy.delay_for(1), None);
        assert_eq!(policy.delay_for(2), None);
    }

    #[test]
    fn test_zero_attempt_is_immediate() {
        assert_eq!(
            RetryPolicy::with_defaults().delay_for(0),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = RetryConfig::default()
            .with_max_attempts(7)
            .with_strategy(BackoffStrategy::Linear { increment_ms: 50 });
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RetryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: RetryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay, Duration::from_millis(250));
        assert_eq!(config.strategy, BackoffStrategy::Exponential { multiplier: 2.0 });
    }
}
