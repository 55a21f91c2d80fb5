//! Retry policy definition

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Maximum number of attempts; 0 retries until success or cancellation
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Backoff multiplier for exponential growth
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Delay after the first failure, in milliseconds
    #[serde(default = "default_interval")]
    pub interval_ms: u64,

    /// Upper bound for any single delay, in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Fixed-interval policy with `max_attempts` attempts
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        let interval_ms = interval.as_millis() as u64;
        Self {
            max_attempts,
            strategy: RetryStrategy::Fixed,
            backoff_multiplier: default_backoff_multiplier(),
            interval_ms,
            max_delay_ms: interval_ms.max(default_max_delay()),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts == 0
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Strategy actually applied; unbounded policies always back off
    /// exponentially
    pub fn effective_strategy(&self) -> RetryStrategy {
        if self.is_unbounded() {
            RetryStrategy::Exponential
        } else {
            self.strategy
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: RetryStrategy::default(),
            backoff_multiplier: default_backoff_multiplier(),
            interval_ms: default_interval(),
            max_delay_ms: default_max_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    10
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_interval() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// Same delay after every failure (default)
    #[default]
    Fixed,

    /// Delay multiplied by `backoff_multiplier` after every failure
    Exponential,
}
