//! Exponential backoff and the retry budget.

use std::time::Duration;

use rand::Rng;

/// Computes how long to wait before automatic attempt *n*.
///
/// `delay(n) = min(base × 2^(n−1), max)`, with `n` starting at 1. With
/// `jitter > 0` the result is scaled by a random factor in
/// `[1 − jitter, 1 + jitter]` and capped at `max` again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    /// 0.0 (exact formula) to 1.0.
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            jitter: 0.0,
        }
    }
}

impl BackoffPolicy {
    /// The un-jittered delay for attempt `attempt` (1-indexed).
    ///
    /// Attempt 0 is treated as attempt 1. Saturates instead of overflowing
    /// for large attempt numbers.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// [`delay_for`](Self::delay_for) with jitter applied.
    pub fn jittered_delay_for(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return delay;
        }
        let factor = rand::rng().random_range((1.0 - jitter)..=(1.0 + jitter));
        delay.mul_f64(factor).min(self.max)
    }
}

/// How many automatic attempts have been spent since the last success.
///
/// - reset to zero attempts / base delay whenever a connection succeeds
///   (and on a manual connect)
/// - incremented once per failed *automatic* attempt
/// - exhausted when `attempt_count >= max_attempts`: no more automatic
///   attempts until reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryBudget {
    pub attempt_count: u32,
    pub max_attempts: u32,
    /// Delay of the most recently scheduled retry (base delay after reset).
    pub current_delay: Duration,
    pub max_delay: Duration,
    base_delay: Duration,
}

impl RetryBudget {
    pub fn new(max_attempts: u32, policy: &BackoffPolicy) -> Self {
        Self {
            attempt_count: 0,
            max_attempts,
            current_delay: policy.base,
            max_delay: policy.max,
            base_delay: policy.base,
        }
    }

    /// Back to zero attempts and the base delay.
    pub fn reset(&mut self) {
        self.attempt_count = 0;
        self.current_delay = self.base_delay;
    }

    /// Counts one failed automatic attempt.
    pub fn record_failure(&mut self) {
        self.attempt_count = self.attempt_count.saturating_add(1);
    }

    /// The number the next automatic attempt will carry, or `None` when the
    /// budget is spent.
    pub fn next_attempt(&self) -> Option<u32> {
        if self.is_exhausted() {
            None
        } else {
            Some(self.attempt_count + 1)
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_reference_delays() {
        let policy = BackoffPolicy::default();
        let delays: Vec<_> = (1..=7).map(|n| policy.delay_for(n)).collect();
        assert_eq!(
            delays,
            vec![ms(1000), ms(2000), ms(4000), ms(8000), ms(16000), ms(30000), ms(30000)]
        );
    }

    #[test]
    fn test_delay_saturates_for_huge_attempts() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(u32::MAX), ms(30000));
        assert_eq!(policy.delay_for(64), ms(30000));
    }

    #[test]
    fn test_attempt_zero_is_treated_as_first() {
        assert_eq!(BackoffPolicy::default().delay_for(0), ms(1000));
    }

    #[test]
    fn test_custom_base_and_cap() {
        let policy = BackoffPolicy {
            base: ms(250),
            max: ms(1500),
            jitter: 0.0,
        };
        assert_eq!(policy.delay_for(1), ms(250));
        assert_eq!(policy.delay_for(3), ms(1000));
        assert_eq!(policy.delay_for(4), ms(1500));
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let policy = BackoffPolicy::default();
        for n in 1..=8 {
            assert_eq!(policy.jittered_delay_for(n), policy.delay_for(n));
        }
    }

    #[test]
    fn test_jitter_stays_in_band_and_under_cap() {
        let policy = BackoffPolicy {
            jitter: 0.25,
            ..BackoffPolicy::default()
        };
        for _ in 0..200 {
            let d = policy.jittered_delay_for(2);
            assert!(d >= ms(1500) && d <= ms(2500), "{d:?}");
            assert!(policy.jittered_delay_for(10) <= ms(30000));
        }
    }

    #[test]
    fn test_budget_counts_and_exhausts() {
        let mut budget = RetryBudget::new(2, &BackoffPolicy::default());
        assert_eq!(budget.next_attempt(), Some(1));
        budget.record_failure();
        assert_eq!(budget.next_attempt(), Some(2));
        budget.record_failure();
        assert!(budget.is_exhausted());
        assert_eq!(budget.next_attempt(), None);

        budget.current_delay = ms(2000);
        budget.reset();
        assert_eq!(budget.attempt_count, 0);
        assert_eq!(budget.current_delay, ms(1000));
        assert_eq!(budget.next_attempt(), Some(1));
    }

    #[test]
    fn test_zero_max_attempts_is_immediately_exhausted() {
        let budget = RetryBudget::new(0, &BackoffPolicy::default());
        assert!(budget.is_exhausted());
    }
}
