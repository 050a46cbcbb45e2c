//! Bounded exponential backoff, generalized from the embedding provider's
//! own retry loop into a reusable helper for any fallible async operation.

use std::time::Duration;

/// Retry policy: at most `max_attempts` calls total, waiting
/// `initial * 2^(attempt-1)` (capped at `max_delay`) between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self { max_attempts, initial_delay, max_delay }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let scaled = self.initial_delay.saturating_mul(factor.min(u32::MAX as u64) as u32);
        scaled.min(self.max_delay)
    }
}

/// Run `op` up to `policy.max_attempts` times. `should_retry` decides whether
/// a given error is transient; non-transient errors fail immediately without
/// consuming further attempts.
pub async fn retry_with_backoff<T, E, F, Fut, R>(policy: RetryPolicy, mut op: F, should_retry: R) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_attempts || !should_retry(&err) {
                    return Err(err);
                }
                tokio::time::sleep(policy.delay_for(attempt)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2));
        let result: Result<u32, &str> = retry_with_backoff(
            policy,
            || async {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(n)
                }
            },
            |_| true,
        )
        .await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test]
    async fn stops_on_non_retryable_error() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1), Duration::from_millis(2));
        let result: Result<u32, &str> =
            retry_with_backoff(policy, || async { Err("fatal") }, |_| false).await;
        assert_eq!(result, Err("fatal"));
    }
}
