//! Exponential backoff policy for handler retries
//!
//! Delays grow geometrically per attempt and are capped; the sequence
//! for the defaults is 1s, 2s, 4s, 8s, 10s, 10s, ...

use std::time::Duration;

/// Backoff parameters for retrying a failed handler
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt
    pub initial_delay: Duration,

    /// Growth factor between consecutive delays
    pub multiplier: u32,

    /// Upper bound on any single delay
    pub max_delay: Duration,

    /// Total handler invocations per delivery, including the first
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(10),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given completed attempt (1-based)
    ///
    /// `delay(n) = min(initial_delay * multiplier^(n-1), max_delay)`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_delay.min(self.max_delay);
        for _ in 1..attempt.max(1) {
            delay = match delay.checked_mul(self.multiplier) {
                Some(next) => next,
                None => return self.max_delay,
            };
            if delay >= self.max_delay {
                return self.max_delay;
            }
        }
        delay
    }

    /// True when no attempts remain after the given attempt count
    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delay_sequence() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
        assert_eq!(policy.delay_after(4), Duration::from_secs(8));
        assert_eq!(policy.delay_after(5), Duration::from_secs(10));
        assert_eq!(policy.delay_after(6), Duration::from_secs(10));
    }

    #[test]
    fn test_delays_never_decrease() {
        let policy = RetryPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 1..=20 {
            let delay = policy.delay_after(attempt);
            assert!(delay >= previous);
            assert!(delay <= policy.max_delay);
            previous = delay;
        }
    }

    #[test]
    fn test_initial_delay_already_above_cap() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(10),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_after(1), Duration::from_secs(10));
    }

    #[test]
    fn test_custom_multiplier() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(100),
            multiplier: 3,
            max_delay: Duration::from_secs(60),
            max_attempts: 5,
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(300));
        assert_eq!(policy.delay_after(3), Duration::from_millis(900));
    }

    #[test]
    fn test_exhaustion_boundary() {
        let policy = RetryPolicy::default();
        assert!(!policy.exhausted(1));
        assert!(!policy.exhausted(2));
        assert!(policy.exhausted(3));
        assert!(policy.exhausted(4));
    }

    #[test]
    fn test_zero_attempt_treated_as_first() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(0), policy.delay_after(1));
    }
}
