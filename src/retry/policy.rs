//! Retry policy: delay between attempts and the attempt budget.

use std::fmt::Display;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::debug;

/// Default delay between attempts.
const DEFAULT_DELAY: Duration = Duration::from_millis(1);

/// Default number of attempts before giving up.
const DEFAULT_MAX_ATTEMPTS: u32 = 60;

/// A bounded retry policy.
///
/// A policy tracks how many attempts it has left. Running it through a
/// [`RetryRunner`](super::RetryRunner) consumes it, so every retried operation
/// starts from a fresh budget. Keep an unused policy around as a template and
/// clone it per operation.
///
/// # Example
///
/// ```
/// use pls::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new()
///     .with_delay(Duration::from_secs(1))
///     .with_max_attempts(10);
///
/// assert_eq!(policy.max_attempts(), 10);
/// assert_eq!(policy.remaining(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
    max_attempts: u32,
    remaining: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            remaining: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the default delay and attempt budget.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delay between attempts. A zero delay is raised to one millisecond.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay.max(Duration::from_millis(1));
        self
    }

    /// Sets the attempt budget. At least one attempt is always made.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.remaining = self.max_attempts;
        self
    }

    /// Delay between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Total attempt budget.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Attempts left before the policy is exhausted.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Number of failures reported so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts - self.remaining
    }

    /// Returns true once no attempts are left.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Records a failed attempt.
    pub fn report(&mut self, err: &impl Display) {
        self.remaining = self.remaining.saturating_sub(1);
        debug!(
            remaining = self.remaining,
            max_attempts = self.max_attempts,
            "Attempt failed: {err}"
        );
    }

    /// Stops the policy so no further attempts are made.
    pub fn cancel(&mut self) {
        self.remaining = 0;
    }

    /// Ticker that fires once per delay, starting one delay from now.
    pub(crate) fn ticker(&self) -> Interval {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.delay, self.delay);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(), Duration::from_millis(1));
        assert_eq!(policy.max_attempts(), 60);
        assert_eq!(policy.remaining(), 60);
        assert!(!policy.is_exhausted());
    }

    #[test]
    fn test_report_counts_down_to_exhaustion() {
        let mut policy = RetryPolicy::new().with_max_attempts(2);

        policy.report(&"boom");
        assert_eq!(policy.remaining(), 1);
        assert_eq!(policy.attempts(), 1);

        policy.report(&"boom");
        assert!(policy.is_exhausted());

        policy.report(&"boom");
        assert_eq!(policy.remaining(), 0);
    }

    #[test]
    fn test_cancel_exhausts() {
        let mut policy = RetryPolicy::new();
        policy.cancel();
        assert!(policy.is_exhausted());
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let policy = RetryPolicy::new()
            .with_delay(Duration::ZERO)
            .with_max_attempts(0);
        assert_eq!(policy.delay(), Duration::from_millis(1));
        assert_eq!(policy.max_attempts(), 1);
    }
}
