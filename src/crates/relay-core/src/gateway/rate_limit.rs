//! Token-bucket rate limiting for the upstream gateway. Unlike a per-client
//! limiter, the upstream workspace API imposes one shared reservoir across
//! the whole process, so there is a single global bucket rather than a map
//! keyed by caller identity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared token bucket. `capacity` is the reservoir size (burst allowance);
/// `refill_per_sec` tokens trickle back in per second of elapsed time.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tokens: Arc<AtomicU64>,
    last_refill_ms: Arc<AtomicU64>,
    capacity: u64,
    refill_per_sec: u64,
}

impl RateLimiter {
    pub fn new(capacity: u64, refill_per_sec: u64) -> Self {
        let now_ms = chrono::Utc::now().timestamp_millis() as u64;
        Self {
            tokens: Arc::new(AtomicU64::new(capacity)),
            last_refill_ms: Arc::new(AtomicU64::new(now_ms)),
            capacity,
            refill_per_sec,
        }
    }

    fn refill(&self) -> u64 {
        let now_ms = chrono::Utc::now().timestamp_millis() as u64;
        let last = self.last_refill_ms.load(Ordering::Relaxed);
        let elapsed_ms = now_ms.saturating_sub(last);
        let gained = (elapsed_ms * self.refill_per_sec) / 1000;

        let current = self.tokens.load(Ordering::Relaxed);
        let refilled = std::cmp::min(current + gained, self.capacity);

        self.last_refill_ms.store(now_ms, Ordering::Relaxed);
        self.tokens.store(refilled, Ordering::Relaxed);
        refilled
    }

    /// Try to take one token. Returns `false` without blocking if the
    /// reservoir is empty; callers back off and retry (see `gateway::retry`).
    pub fn try_acquire(&self) -> bool {
        let available = self.refill();
        if available >= 1 {
            self.tokens.store(available - 1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Tokens currently available, after accounting for elapsed refill.
    pub fn available(&self) -> u64 {
        self.refill()
    }

    /// Block until a token is available, polling at a short fixed interval.
    /// Used by the gateway in front of every upstream call so the reservoir
    /// is respected without the caller needing its own backoff loop.
    pub async fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_up_to_capacity_then_blocks() {
        let limiter = RateLimiter::new(3, 1);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn refills_over_time() {
        let limiter = RateLimiter::new(1, 1000); // 1000/sec refill, easy to observe
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(limiter.try_acquire());
    }
}
