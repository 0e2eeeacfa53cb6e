//! Reconnect budget accounting.
//!
//! The transport invokes the policy whenever a connection is lost or a
//! connect attempt fails. The policy only counts and paces; scheduling the
//! next attempt is the state machine's job.

use std::time::Duration;

/// Counts reconnect attempts against a fixed budget.
///
/// The counter resets on every successful connection, so the budget bounds
/// consecutive failures rather than lifetime failures.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tether::reconnect::ReconnectPolicy;
///
/// let mut policy = ReconnectPolicy::new(1, Duration::from_secs(1));
/// assert!(policy.next_attempt().is_some());
/// assert!(policy.next_attempt().is_none());
/// policy.reset();
/// assert!(policy.next_attempt().is_some());
/// ```
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    interval: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy allowing `max_attempts` consecutive failures with
    /// `interval` between attempts. The interval is clamped to at least one
    /// millisecond.
    #[must_use]
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval: interval.max(Duration::from_millis(1)),
            attempts: 0,
        }
    }

    /// Claim the next attempt.
    ///
    /// Returns the delay to wait before connecting, or `None` when the
    /// budget is exhausted.
    pub fn next_attempt(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.interval)
    }

    /// Forget past failures after a successful connection.
    pub fn reset(&mut self) { self.attempts = 0; }

    /// Whether the budget has no attempts left to claim.
    #[must_use]
    pub fn is_exhausted(&self) -> bool { self.attempts >= self.max_attempts }

    /// Attempts claimed since the last reset.
    #[must_use]
    pub fn attempts(&self) -> u32 { self.attempts }

    /// Configured budget.
    #[must_use]
    pub fn max_attempts(&self) -> u32 { self.max_attempts }

    /// Configured inter-attempt delay.
    #[must_use]
    pub fn interval(&self) -> Duration { self.interval }
}
