//! Outcome of a retry loop that did not produce a value

use std::time::Duration;
use thiserror::Error;

/// Why `RetryExecutor::execute` gave up.
///
/// `E` is the error type of the retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// A bounded policy ran out of attempts
    #[error("gave up after {attempts} attempts in {:.2}s: {last}", .elapsed.as_secs_f64())]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
        elapsed: Duration,
    },

    /// The shutdown token fired before the operation succeeded.
    ///
    /// Not a failure of the operation itself.
    #[error("cancelled after {attempts} attempts")]
    Cancelled {
        attempts: u32,
        #[source]
        last: Option<E>,
    },
}

impl<E: std::error::Error + 'static> RetryError<E> {
    pub fn exhausted(attempts: u32, last: E, elapsed: Duration) -> Self {
        RetryError::Exhausted {
            attempts,
            last,
            elapsed,
        }
    }

    pub fn cancelled(attempts: u32, last: Option<E>) -> Self {
        RetryError::Cancelled { attempts, last }
    }

    /// Attempts started before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// Error of the most recent attempt, if one ran
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Cancelled { last, .. } => last.as_ref(),
        }
    }

    pub fn into_last_error(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Cancelled { last, .. } => last,
        }
    }
}
