//! Consecutive-failure circuit breaker for the vector store coordinator.
//!
//! After five consecutive upsert failures the breaker opens and further
//! upserts are short-circuited (skipped, not failed) for a sixty-second
//! cooldown; the next call after the cooldown is treated as a probe.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const FAILURE_THRESHOLD: u32 = 5;
const COOLDOWN: Duration = Duration::from_secs(60);

pub struct CircuitBreaker {
    consecutive_failures: AtomicU32,
    opened_at: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            opened_at: Mutex::new(None),
        }
    }

    /// Returns true if a call should be skipped right now.
    pub async fn should_skip(&self) -> bool {
        let mut opened_at = self.opened_at.lock().await;
        match *opened_at {
            None => false,
            Some(when) => {
                if when.elapsed() >= COOLDOWN {
                    // Cooldown elapsed: allow a single probe attempt through.
                    *opened_at = None;
                    self.consecutive_failures.store(0, Ordering::SeqCst);
                    false
                } else {
                    true
                }
            }
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    pub async fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= FAILURE_THRESHOLD {
            let mut opened_at = self.opened_at.lock().await;
            if opened_at.is_none() {
                *opened_at = Some(Instant::now());
            }
        }
    }

    pub fn is_open_sync(&self) -> bool {
        self.consecutive_failures.load(Ordering::SeqCst) >= FAILURE_THRESHOLD
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_five_consecutive_failures() {
        let breaker = CircuitBreaker::new();
        for _ in 0..4 {
            breaker.record_failure().await;
            assert!(!breaker.should_skip().await);
        }
        breaker.record_failure().await;
        assert!(breaker.should_skip().await);
    }

    #[tokio::test]
    async fn success_resets_the_counter() {
        let breaker = CircuitBreaker::new();
        for _ in 0..4 {
            breaker.record_failure().await;
        }
        breaker.record_success();
        assert!(!breaker.is_open_sync());
    }
}
