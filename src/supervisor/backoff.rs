//! Exponential backoff for reconnection attempts
//!
//! Pure delay computation, kept apart from the timer that acts on it.

use std::time::Duration;

/// Configuration for backoff behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay after the first failure
    pub initial: Duration,

    /// Upper bound for any delay
    pub max: Duration,

    /// Growth factor per attempt (2 for doubling)
    pub multiplier: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2,
        }
    }
}

impl BackoffPolicy {
    /// Create a config for quick retries (short backoff), mostly useful in tests
    pub fn quick() -> Self {
        Self {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(200),
            multiplier: 2,
        }
    }

    /// `min(initial * multiplier^attempt, max)`
    ///
    /// `attempt` counts previous consecutive failures, starting at 0.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let max_ms = self.max.as_millis();
        let factor = u128::from(self.multiplier).checked_pow(attempt);

        let delay_ms = match factor {
            Some(factor) => self.initial.as_millis().saturating_mul(factor).min(max_ms),
            None => max_ms,
        };

        Duration::from_millis(u64::try_from(delay_ms).unwrap_or(u64::MAX))
    }
}

/// Delay before retry `attempt` under the default policy (1s doubling, capped at 30s)
pub fn delay_for_attempt(attempt: u32) -> Duration {
    BackoffPolicy::default().delay_for_attempt(attempt)
}
