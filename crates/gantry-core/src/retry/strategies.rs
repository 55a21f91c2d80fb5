//! Delay computation

use super::policy::{RetryPolicy, RetryStrategy};
use std::time::Duration;

/// Shortest base interval an unbounded policy backs off from. A zero
/// interval would otherwise stay at zero forever.
pub const UNBOUNDED_MIN_INTERVAL_MS: u64 = 100;

/// Delay to wait after failed `attempt` (1-indexed) before the next one.
///
/// The result never exceeds `max_delay_ms` (or the interval itself, when
/// that is larger). Unbounded policies start from at least
/// `UNBOUNDED_MIN_INTERVAL_MS`.
///
/// ```rust
/// use gantry_core::retry::{calculate_delay, RetryPolicy, RetryStrategy};
///
/// let policy = RetryPolicy {
///     max_attempts: 0,
///     strategy: RetryStrategy::Fixed,
///     backoff_multiplier: 2.0,
///     interval_ms: 100,
///     max_delay_ms: 400,
/// };
///
/// // Unbounded policies back off exponentially regardless of `strategy`
/// let delays: Vec<u128> = (1..=4)
///     .map(|n| calculate_delay(&policy, n).as_millis())
///     .collect();
/// assert_eq!(delays, vec![100, 200, 400, 400]);
/// ```
pub fn calculate_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let interval_ms = base_interval_ms(policy);
    let ceiling = policy.max_delay_ms.max(interval_ms);
    Duration::from_millis(uncapped_delay_ms(policy, interval_ms, attempt).min(ceiling))
}

fn base_interval_ms(policy: &RetryPolicy) -> u64 {
    if policy.is_unbounded() {
        policy.interval_ms.max(UNBOUNDED_MIN_INTERVAL_MS)
    } else {
        policy.interval_ms
    }
}

fn uncapped_delay_ms(policy: &RetryPolicy, interval_ms: u64, attempt: u32) -> u64 {
    match policy.effective_strategy() {
        RetryStrategy::Fixed => interval_ms,
        RetryStrategy::Exponential => {
            // Past 2^32 the ceiling wins for any sane interval
            let steps = attempt.saturating_sub(1).min(32) as i32;
            let ms = interval_ms as f64 * policy.backoff_multiplier.powi(steps);
            if ms.is_finite() && ms < u64::MAX as f64 {
                ms as u64
            } else {
                u64::MAX
            }
        }
    }
}
