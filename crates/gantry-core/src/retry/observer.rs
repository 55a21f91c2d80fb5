//! Retry progress reporting
//!
//! The executor reports every step of a retry loop as a `RetryEvent`;
//! `TracingObserver` turns them into log lines.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// One step of a retry loop. Attempts are 1-indexed; `max_attempts` is 0
/// for unbounded policies.
#[derive(Debug, Clone, Copy)]
pub enum RetryEvent<'a> {
    Started { attempt: u32, max_attempts: u32 },
    /// The attempt failed and the next one follows after `delay`
    Failed {
        attempt: u32,
        error: &'a dyn Error,
        delay: Duration,
    },
    Succeeded { attempt: u32, elapsed: Duration },
    Exhausted { attempts: u32, error: &'a dyn Error },
    /// The shutdown token fired
    Cancelled {
        attempts: u32,
        last: Option<&'a dyn Error>,
    },
}

pub trait RetryObserver: Send + Sync {
    fn observe(&self, event: RetryEvent<'_>);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn observe(&self, _event: RetryEvent<'_>) {}
}

impl<T: RetryObserver + ?Sized> RetryObserver for Arc<T> {
    fn observe(&self, event: RetryEvent<'_>) {
        (**self).observe(event)
    }
}

/// Logs retry progress, tagged with the name of the retried operation
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: String,
}

impl TracingObserver {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("retry")
    }
}

impl RetryObserver for TracingObserver {
    fn observe(&self, event: RetryEvent<'_>) {
        let operation = self.operation.as_str();
        match event {
            RetryEvent::Started {
                attempt,
                max_attempts,
            } => tracing::debug!(operation, attempt, max_attempts, "attempt starting"),
            RetryEvent::Failed {
                attempt,
                error,
                delay,
            } => tracing::warn!(
                operation,
                attempt,
                error = %error,
                delay_ms = delay.as_millis() as u64,
                "attempt failed, retrying"
            ),
            RetryEvent::Succeeded { attempt: 1, elapsed } => tracing::debug!(
                operation,
                elapsed_ms = elapsed.as_millis() as u64,
                "succeeded"
            ),
            RetryEvent::Succeeded { attempt, elapsed } => tracing::info!(
                operation,
                attempt,
                elapsed_ms = elapsed.as_millis() as u64,
                "succeeded after retrying"
            ),
            RetryEvent::Exhausted { attempts, error } => {
                tracing::error!(operation, attempts, error = %error, "giving up")
            }
            RetryEvent::Cancelled { attempts, last } => match last {
                Some(error) => tracing::info!(operation, attempts, error = %error, "cancelled"),
                None => tracing::info!(operation, attempts, "cancelled"),
            },
        }
    }
}
