//! The retry loop
//!
//! `RetryExecutor` repeats an async operation under a `RetryPolicy`. A
//! `RetryObserver` sees every step, and an optional `ShutdownToken` ends
//! the loop early, even while an attempt is still running.

use std::error::Error;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::shutdown::ShutdownToken;

use super::error::RetryError;
use super::observer::{NoOpObserver, RetryEvent, RetryObserver};
use super::policy::RetryPolicy;
use super::strategies::calculate_delay;

/// Builder for `RetryExecutor`
///
/// ```rust
/// use gantry_core::retry::{RetryExecutorBuilder, RetryPolicy, TracingObserver};
/// use gantry_core::ShutdownToken;
///
/// let executor = RetryExecutorBuilder::new()
///     .with_policy(RetryPolicy::default())
///     .with_observer(TracingObserver::new("authentication"))
///     .with_shutdown(ShutdownToken::new())
///     .build();
/// ```
pub struct RetryExecutorBuilder<O = NoOpObserver> {
    policy: RetryPolicy,
    observer: O,
    shutdown: Option<ShutdownToken>,
}

impl Default for RetryExecutorBuilder<NoOpObserver> {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryExecutorBuilder<NoOpObserver> {
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
            observer: NoOpObserver,
            shutdown: None,
        }
    }
}

impl<O> RetryExecutorBuilder<O> {
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_observer<O2>(self, observer: O2) -> RetryExecutorBuilder<O2> {
        RetryExecutorBuilder {
            policy: self.policy,
            observer,
            shutdown: self.shutdown,
        }
    }

    /// Give up with `RetryError::Cancelled` once `token` fires, whether
    /// between attempts, while sleeping, or in the middle of an attempt
    pub fn with_shutdown(mut self, token: ShutdownToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn build(self) -> RetryExecutor<O> {
        RetryExecutor {
            policy: self.policy,
            observer: self.observer,
            shutdown: self.shutdown,
        }
    }
}

pub struct RetryExecutor<O = NoOpObserver> {
    policy: RetryPolicy,
    observer: O,
    shutdown: Option<ShutdownToken>,
}

impl<O> RetryExecutor<O>
where
    O: RetryObserver,
{
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds or the loop gives up.
    ///
    /// A bounded policy calls `op` at most `max_attempts` times and sleeps
    /// only between calls. An unbounded policy stops only on success or
    /// shutdown. An attempt still running at shutdown is dropped.
    pub async fn execute<F, Fut, T, E>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + Send + 'static,
    {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts;
        let mut last: Option<E> = None;
        let mut attempt: u32 = 0;

        loop {
            if self.shutdown_requested() {
                return Err(self.cancel(attempt, last));
            }

            attempt = attempt.saturating_add(1);
            self.observer.observe(RetryEvent::Started {
                attempt,
                max_attempts,
            });

            let outcome = match &self.shutdown {
                Some(token) => tokio::select! {
                    result = op() => Some(result),
                    _ = token.cancelled() => None,
                },
                None => Some(op().await),
            };

            let error = match outcome {
                Some(Ok(value)) => {
                    self.observer.observe(RetryEvent::Succeeded {
                        attempt,
                        elapsed: started.elapsed(),
                    });
                    return Ok(value);
                }
                Some(Err(error)) => error,
                None => return Err(self.cancel(attempt, last)),
            };

            if !self.policy.is_unbounded() && attempt >= max_attempts {
                self.observer.observe(RetryEvent::Exhausted {
                    attempts: attempt,
                    error: &error,
                });
                return Err(RetryError::exhausted(attempt, error, started.elapsed()));
            }

            let delay = calculate_delay(&self.policy, attempt);
            self.observer.observe(RetryEvent::Failed {
                attempt,
                error: &error,
                delay,
            });
            last = Some(error);

            if !self.pause(delay).await {
                return Err(self.cancel(attempt, last));
            }
        }
    }

    /// Sleep for `delay`; false when shutdown cut the sleep short
    async fn pause(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            tokio::task::yield_now().await;
            return true;
        }
        match &self.shutdown {
            Some(token) => tokio::select! {
                _ = tokio::time::sleep(delay) => true,
                _ = token.cancelled() => false,
            },
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }

    fn cancel<E: Error + 'static>(&self, attempts: u32, last: Option<E>) -> RetryError<E> {
        self.observer.observe(RetryEvent::Cancelled {
            attempts,
            last: last.as_ref().map(|e| e as &dyn Error),
        });
        RetryError::cancelled(attempts, last)
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(ShutdownToken::is_cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Counts what the executor reports
    #[derive(Default)]
    struct Tally {
        started: AtomicU32,
        failed: AtomicU32,
        succeeded: AtomicU32,
        exhausted: AtomicU32,
        cancelled: AtomicU32,
    }

    impl Tally {
        fn get(counter: &AtomicU32) -> u32 {
            counter.load(Ordering::SeqCst)
        }
    }

    impl RetryObserver for Tally {
        fn observe(&self, event: RetryEvent<'_>) {
            let counter = match event {
                RetryEvent::Started { .. } => &self.started,
                RetryEvent::Failed { .. } => &self.failed,
                RetryEvent::Succeeded { .. } => &self.succeeded,
                RetryEvent::Exhausted { .. } => &self.exhausted,
                RetryEvent::Cancelled { .. } => &self.cancelled,
            };
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn three_quick_attempts() -> RetryPolicy {
        RetryPolicy::fixed(3, Duration::from_millis(10))
    }

    /// Operation failing for the first `failures` calls
    fn flaky(
        calls: &Arc<AtomicU32>,
        failures: u32,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<u32, io::Error>> + Send>>
    {
        let calls = calls.clone();
        move || {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures {
                    Err(io::Error::new(io::ErrorKind::ConnectionRefused, "link down"))
                } else {
                    Ok(n)
                }
            })
        }
    }

    #[tokio::test]
    async fn test_first_attempt_succeeds() {
        let tally = Arc::new(Tally::default());
        let calls = Arc::new(AtomicU32::new(0));

        let value = RetryExecutorBuilder::new()
            .with_policy(three_quick_attempts())
            .with_observer(tally.clone())
            .build()
            .execute(flaky(&calls, 0))
            .await
            .unwrap();

        assert_eq!(value, 1);
        assert_eq!(Tally::get(&tally.started), 1);
        assert_eq!(Tally::get(&tally.succeeded), 1);
        assert_eq!(Tally::get(&tally.failed), 0);
    }

    #[tokio::test]
    async fn test_recovers_on_second_attempt() {
        let tally = Arc::new(Tally::default());
        let calls = Arc::new(AtomicU32::new(0));

        let value = RetryExecutorBuilder::new()
            .with_policy(three_quick_attempts())
            .with_observer(tally.clone())
            .build()
            .execute(flaky(&calls, 1))
            .await
            .unwrap();

        assert_eq!(value, 2);
        assert_eq!(Tally::get(&tally.failed), 1);
        assert_eq!(Tally::get(&tally.succeeded), 1);
    }

    #[tokio::test]
    async fn test_bounded_policy_exhausts() {
        let tally = Arc::new(Tally::default());
        let calls = Arc::new(AtomicU32::new(0));

        let err = RetryExecutorBuilder::new()
            .with_policy(three_quick_attempts())
            .with_observer(tally.clone())
            .build()
            .execute(flaky(&calls, u32::MAX))
            .await
            .unwrap_err();

        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two sleeps for three attempts
        assert_eq!(Tally::get(&tally.failed), 2);
        assert_eq!(Tally::get(&tally.exhausted), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_sleep() {
        let token = ShutdownToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = RetryExecutorBuilder::new()
            .with_policy(RetryPolicy::fixed(5, Duration::from_secs(60)))
            .with_shutdown(token)
            .build()
            .execute(flaky(&calls, u32::MAX))
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.attempts(), 1);
        assert!(err.last_error().is_some());
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_hanging_attempt() {
        let token = ShutdownToken::new();
        let tally = Arc::new(Tally::default());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = RetryExecutorBuilder::new()
            .with_policy(RetryPolicy::fixed(0, Duration::from_secs(1)))
            .with_observer(tally.clone())
            .with_shutdown(token)
            .build()
            .execute(|| std::future::pending::<Result<(), io::Error>>())
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.attempts(), 1);
        assert!(err.last_error().is_none());
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert_eq!(Tally::get(&tally.cancelled), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let token = ShutdownToken::new();
        token.cancel();
        let calls = Arc::new(AtomicU32::new(0));

        let err = RetryExecutorBuilder::new()
            .with_shutdown(token)
            .build()
            .execute(flaky(&calls, 0))
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
