//! # Per-Key Rate Limiting
//!
//! Failure-driven backoff for work queue keys. Each key carries its own
//! failure counter, so a persistently failing key never slows down others.

use dashmap::DashMap;
use std::time::Duration;

use crate::config::RetryConfig;

/// Decides how long a key waits before it is retried
pub trait RateLimiter: Send + Sync + std::fmt::Debug {
    /// Delay for the next retry of `key`; records one more failure
    fn when(&self, key: &str) -> Duration;

    /// Clear the failure history of `key`
    fn forget(&self, key: &str);

    /// Failures recorded for `key` since it was last forgotten
    fn num_requeues(&self, key: &str) -> u32;
}

/// Exponential backoff per key: `base * 2^failures`, capped at `max`
#[derive(Debug)]
pub struct ItemExponentialFailureRateLimiter {
    failures: DashMap<String, u32>,
    base_delay: Duration,
    max_delay: Duration,
}

impl ItemExponentialFailureRateLimiter {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            failures: DashMap::new(),
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.interval_start(), config.interval_max())
    }

    fn delay_for(&self, exponent: u32) -> Duration {
        // 2^63 nanoseconds is already centuries; anything past that saturates
        if exponent > 62 {
            return self.max_delay;
        }
        let backoff = self
            .base_delay
            .as_nanos()
            .saturating_mul(1u128 << exponent);
        if backoff > self.max_delay.as_nanos() {
            return self.max_delay;
        }
        u64::try_from(backoff)
            .map(Duration::from_nanos)
            .unwrap_or(self.max_delay)
    }
}

impl RateLimiter for ItemExponentialFailureRateLimiter {
    fn when(&self, key: &str) -> Duration {
        let mut entry = self.failures.entry(key.to_string()).or_insert(0);
        let exponent = *entry;
        *entry = exponent.saturating_add(1);
        self.delay_for(exponent)
    }

    fn forget(&self, key: &str) {
        self.failures.remove(key);
    }

    fn num_requeues(&self, key: &str) -> u32 {
        self.failures.get(key).map(|entry| *entry).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> ItemExponentialFailureRateLimiter {
        ItemExponentialFailureRateLimiter::new(Duration::from_secs(1), Duration::from_secs(300))
    }

    #[test]
    fn delay_doubles_until_the_cap() {
        let limiter = limiter();
        let delays: Vec<u64> = (0..11).map(|_| limiter.when("va-1").as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 300, 300]);
        assert_eq!(limiter.num_requeues("va-1"), 11);
    }

    #[test]
    fn keys_back_off_independently() {
        let limiter = limiter();
        limiter.when("va-1");
        limiter.when("va-1");
        limiter.when("va-1");

        assert_eq!(limiter.when("va-2"), Duration::from_secs(1));
        assert_eq!(limiter.num_requeues("va-1"), 3);
        assert_eq!(limiter.num_requeues("va-2"), 1);
    }

    #[test]
    fn forget_resets_the_counter() {
        let limiter = limiter();
        limiter.when("va-1");
        limiter.when("va-1");
        limiter.forget("va-1");

        assert_eq!(limiter.num_requeues("va-1"), 0);
        assert_eq!(limiter.when("va-1"), Duration::from_secs(1));
    }

    #[test]
    fn huge_failure_counts_saturate_at_max() {
        let limiter = limiter();
        limiter.failures.insert("va-1".to_string(), 500);
        assert_eq!(limiter.when("va-1"), Duration::from_secs(300));
    }

    #[test]
    fn builds_from_retry_config() {
        let limiter = ItemExponentialFailureRateLimiter::from_config(&RetryConfig {
            interval_start_ms: 250,
            interval_max_ms: 1_000,
        });
        assert_eq!(limiter.when("k"), Duration::from_millis(250));
        assert_eq!(limiter.when("k"), Duration::from_millis(500));
        assert_eq!(limiter.when("k"), Duration::from_millis(1_000));
        assert_eq!(limiter.when("k"), Duration::from_millis(1_000));
    }
}
