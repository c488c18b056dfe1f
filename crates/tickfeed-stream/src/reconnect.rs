//! Bounded linear reconnect backoff.

use std::time::Duration;

/// Reconnect budget for one session.
///
/// `attempt` counts automatic retries since the last successful open. The
/// n-th retry waits `base_delay * n`; once `attempt` reaches `max_attempts`
/// no further retry is scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub attempt: u32,
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(1000))
    }
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            base_delay,
        }
    }

    /// Start over after a successful open or a manual reconnect.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Consume one retry.
    ///
    /// # Returns
    /// How long to wait before retrying, or `None` when the budget is spent
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempt += 1;
        Some(self.base_delay * self.attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff() {
        let mut policy = ReconnectPolicy::new(3, Duration::from_millis(500));

        assert_eq!(policy.next_delay(), Some(Duration::from_millis(500)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(1000)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(1500)));
        assert!(policy.is_exhausted());
        assert_eq!(policy.next_delay(), None);
        assert_eq!(policy.attempt, 3);
    }

    #[test]
    fn test_reset_restores_budget() {
        let mut policy = ReconnectPolicy::new(2, Duration::from_secs(1));
        policy.next_delay();
        policy.next_delay();
        assert!(policy.is_exhausted());

        policy.reset();
        assert_eq!(policy.attempt, 0);
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_zero_budget_never_retries() {
        let mut policy = ReconnectPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.next_delay(), None);
    }
}
