//! Minimum-interval pacing between successive page fetches, independent of
//! the `Semaphore(concurrency)` that bounds how many page tasks run at
//! once — this bounds *how often* any one task is allowed through, not how
//! many run concurrently.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

pub struct RateLimiter {
    min_interval: Duration,
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, next_allowed: Mutex::new(None) }
    }

    /// Blocks the caller (asynchronously) until the minimum interval since
    /// the previous `acquire` has elapsed.
    pub async fn acquire(&self) {
        let wait_until = {
            let mut next_allowed = self.next_allowed.lock().expect("rate limiter lock poisoned");
            let now = Instant::now();
            let start = (*next_allowed).unwrap_or(now).max(now);
            *next_allowed = Some(start + self.min_interval);
            start
        };
        tokio::time::sleep_until(wait_until).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_is_paced_by_min_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(20));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
