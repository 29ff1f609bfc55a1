//! Token-bucket admission control for gated write actions.
//!
//! Buckets refill by full reset rather than continuous leak: once the
//! interval has elapsed the bucket is completely replenished, otherwise
//! it is left alone. Capacity and interval are supplied per call, so a
//! single limiter serves multiple action classes distinguished by key.
//!
//! Admission never fails; a denial is a normal return value carrying
//! the time until the next refill.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default bound on tracked keys before least-recently-used eviction.
const DEFAULT_KEY_CAPACITY: usize = 64;

/// Outcome of an admission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the action may proceed.
    pub allowed: bool,
    /// Time until the bucket refills. Zero when allowed.
    pub retry_after: Duration,
}

impl RateDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after: Duration::ZERO,
        }
    }

    fn deny(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after,
        }
    }
}

/// Admission state for one action key.
#[derive(Debug)]
struct TokenBucket {
    tokens: u32,
    last_refill: Instant,
}

/// Process-local token-bucket rate limiter.
///
/// The bucket store is bounded: once the key capacity is reached, the
/// least recently used key is evicted and behaves like a fresh bucket
/// on its next use.
pub struct RateLimiter {
    buckets: Mutex<LruCache<String, TokenBucket>>,
}

impl RateLimiter {
    /// Limiter with the default key bound.
    pub fn new() -> Self {
        Self::with_key_capacity(NonZeroUsize::new(DEFAULT_KEY_CAPACITY).expect("nonzero capacity"))
    }

    /// Limiter with a custom bound on tracked keys.
    pub fn with_key_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            buckets: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Try to consume one token for `key`.
    ///
    /// `capacity` tokens are granted per `interval`; the bucket resets
    /// in full once the interval has elapsed since the last reset.
    ///
    /// Precondition: `capacity > 0` and a non-zero `interval`.
    pub fn try_consume(&self, key: &str, capacity: u32, interval: Duration) -> RateDecision {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();

        let bucket = buckets.get_or_insert_mut(key.to_string(), || TokenBucket {
            tokens: capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill);
        if elapsed > interval {
            bucket.tokens = capacity;
            bucket.last_refill = now;
        }

        if bucket.tokens == 0 {
            let retry_after = interval.saturating_sub(elapsed);
            debug!(key, ?retry_after, "rate limited");
            return RateDecision::deny(retry_after);
        }

        bucket.tokens -= 1;
        RateDecision::allow()
    }

    /// Remaining tokens for `key`, if a bucket exists. Observational
    /// only; does not touch recency.
    pub fn remaining(&self, key: &str) -> Option<u32> {
        self.buckets.lock().peek(key).map(|bucket| bucket.tokens)
    }

    /// Drop the bucket for `key`, restoring full capacity on next use.
    pub fn reset(&self, key: &str) {
        self.buckets.lock().pop(key);
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.lock().len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl RateLimiter {
    /// Backdate a bucket's last refill, simulating elapsed time.
    fn backdate(&self, key: &str, by: Duration) {
        let mut buckets = self.buckets.lock();
        if let Some(bucket) = buckets.get_mut(key) {
            bucket.last_refill -= by;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const INTERVAL: Duration = Duration::from_millis(1000);

    #[test]
    fn test_bucket_exhaustion() {
        let limiter = RateLimiter::new();

        let decisions: Vec<bool> = (0..4)
            .map(|_| limiter.try_consume("place-bid", 3, INTERVAL).allowed)
            .collect();
        assert_eq!(decisions, vec![true, true, true, false]);

        let denied = limiter.try_consume("place-bid", 3, INTERVAL);
        assert!(!denied.allowed);
        assert!(denied.retry_after > Duration::ZERO);
    }

    #[test]
    fn test_full_reset_after_interval() {
        let limiter = RateLimiter::new();

        for _ in 0..3 {
            assert!(limiter.try_consume("submit", 3, INTERVAL).allowed);
        }
        assert!(!limiter.try_consume("submit", 3, INTERVAL).allowed);

        limiter.backdate("submit", INTERVAL + Duration::from_millis(10));

        // Fresh bucket minus the token just consumed, not a partial refill.
        assert!(limiter.try_consume("submit", 3, INTERVAL).allowed);
        assert_eq!(limiter.remaining("submit"), Some(2));
    }

    #[test]
    fn test_denial_leaves_bucket_unchanged() {
        let limiter = RateLimiter::new();

        assert!(limiter.try_consume("send", 1, INTERVAL).allowed);
        assert_eq!(limiter.remaining("send"), Some(0));

        assert!(!limiter.try_consume("send", 1, INTERVAL).allowed);
        assert_eq!(limiter.remaining("send"), Some(0));
    }

    #[test]
    fn test_keys_are_isolated() {
        let limiter = RateLimiter::new();

        assert!(limiter.try_consume("a", 1, INTERVAL).allowed);
        assert!(!limiter.try_consume("a", 1, INTERVAL).allowed);

        assert!(limiter.try_consume("b", 1, INTERVAL).allowed);
    }

    #[test]
    fn test_reset_restores_capacity() {
        let limiter = RateLimiter::new();

        assert!(limiter.try_consume("upload", 1, INTERVAL).allowed);
        assert!(!limiter.try_consume("upload", 1, INTERVAL).allowed);

        limiter.reset("upload");
        assert!(limiter.try_consume("upload", 1, INTERVAL).allowed);
    }

    #[test]
    fn test_lru_eviction_of_cold_keys() {
        let limiter = RateLimiter::with_key_capacity(NonZeroUsize::new(2).unwrap());

        limiter.try_consume("a", 5, INTERVAL);
        limiter.try_consume("b", 5, INTERVAL);
        limiter.try_consume("c", 5, INTERVAL);

        assert_eq!(limiter.tracked_keys(), 2);
        assert_eq!(limiter.remaining("a"), None);
        assert_eq!(limiter.remaining("c"), Some(4));
    }

    proptest! {
        #[test]
        fn allowed_count_never_exceeds_capacity(capacity in 1u32..50, attempts in 1usize..200) {
            let limiter = RateLimiter::new();
            let interval = Duration::from_secs(60);

            let allowed = (0..attempts)
                .filter(|_| limiter.try_consume("k", capacity, interval).allowed)
                .count();
            prop_assert_eq!(allowed, attempts.min(capacity as usize));
        }

        #[test]
        fn tokens_stay_within_bounds(consumes in 1usize..20) {
            let limiter = RateLimiter::new();
            let interval = Duration::from_secs(60);

            for _ in 0..consumes {
                limiter.try_consume("k", 8, interval);
            }
            let remaining = limiter.remaining("k").unwrap();
            prop_assert!(remaining <= 8);
            prop_assert_eq!(remaining as usize, 8usize.saturating_sub(consumes));
        }
    }
}
