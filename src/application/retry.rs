//! Bounded retry for store reads on latency-sensitive paths.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::ports::StoreError;

/// Retry policy: each attempt is bounded by `attempt_timeout`; after a
/// transient failure the next attempt waits `attempt * backoff_step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_step: Duration,
    attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(200),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, backoff_step: Duration, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_step,
            attempt_timeout,
        }
    }

    /// Single attempt with the timeout only. Used on write paths, where the
    /// processor's redelivery is the retry.
    pub fn single_attempt(attempt_timeout: Duration) -> Self {
        Self::new(1, Duration::ZERO, attempt_timeout)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the
    /// attempts are used up. Returns the last error in that case.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 1;
        loop {
            let error = match timeout(self.attempt_timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => err,
                Err(_) => StoreError::Timeout(self.attempt_timeout),
            };

            if !error.is_transient() || attempt >= self.max_attempts {
                return Err(error);
            }

            tracing::warn!(
                operation,
                attempt,
                max_attempts = self.max_attempts,
                error = %error,
                "Store call failed, retrying"
            );
            sleep(self.backoff_step * attempt).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(50))
    }

    #[test]
    fn default_policy_matches_read_path_budget() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.attempt_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::from_secs(1)).max_attempts(), 1);
    }

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = fast()
            .run("read", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, StoreError>(7)
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = fast()
            .run("read", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StoreError::backend("flaky"))
                } else {
                    Ok(1)
                }
            })
            .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), _> = fast()
            .run("read", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::backend("down"))
            })
            .await;

        assert_eq!(result, Err(StoreError::backend("down")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn serialization_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), _> = fast()
            .run("read", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Serialization("bad".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_attempts_time_out() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(10));
        let result: Result<(), _> = policy
            .run("read", move || async move {
                sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;

        assert_eq!(result, Err(StoreError::Timeout(Duration::from_millis(10))));
    }
}
