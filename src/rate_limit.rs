//! Rolling-window rate limiter for vector store operations.
//!
//! Tracks timestamps of recent operations in a small ring behind a mutex;
//! `acquire` blocks (by sleeping) until the caller would not exceed
//! `max_events` events within `window`.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub struct RateLimiter {
    max_events: usize,
    window: Duration,
    events: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_events: usize, window: Duration) -> Self {
        Self { max_events, window, events: Mutex::new(VecDeque::new()) }
    }

    /// Wait until a new event is permitted, then record it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut events = self.events.lock().await;
                let now = Instant::now();
                while events.front().is_some_and(|t| now.duration_since(*t) > self.window) {
                    events.pop_front();
                }
                if events.len() < self.max_events {
                    events.push_back(now);
                    None
                } else {
                    let oldest = *events.front().unwrap();
                    Some(self.window - now.duration_since(oldest))
                }
            };
            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_max_events_immediately() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn blocks_the_fourth_event_until_window_clears() {
        let limiter = RateLimiter::new(1, Duration::from_millis(50));
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
