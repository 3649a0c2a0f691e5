//! Retry policy for the initial request of a call
//!
//! Only the request that opens a call is retried. Once a response (or the
//! first byte of a stream) has arrived, failures are handed to the caller.

use crate::http::error::TransportError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::warn;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,

    /// Initial delay before first retry (milliseconds)
    pub initial_delay_ms: u64,

    /// Maximum delay between retries (milliseconds)
    pub max_delay_ms: u64,

    /// Base for exponential backoff (e.g., 2.0 for doubling)
    pub exponential_base: f64,

    /// Jitter factor (0.0 to 1.0) to randomize delays
    pub jitter_factor: f64,

    /// Whether to respect Retry-After headers
    pub respect_retry_after: bool,

    /// Maximum total time to spend retrying (milliseconds)
    pub timeout_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            exponential_base: 2.0,
            jitter_factor: 0.1,
            respect_retry_after: true,
            timeout_ms: Some(60_000),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with custom attempt count
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Create a conservative retry policy to minimize load
    pub fn conservative() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 1_000,
            max_delay_ms: 15_000,
            exponential_base: 3.0,
            jitter_factor: 0.3,
            respect_retry_after: true,
            timeout_ms: Some(30_000),
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given retry attempt
    pub fn calculate_delay(&self, attempt: u32, error: &TransportError) -> Duration {
        if self.respect_retry_after {
            if let Some(retry_after) = error.retry_after() {
                return retry_after.min(Duration::from_millis(self.max_delay_ms));
            }
        }

        let base_delay = self.initial_delay_ms as f64 * self.exponential_base.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        let delay_with_jitter = if self.jitter_factor > 0.0 {
            let jitter_range = capped_delay * self.jitter_factor;
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped_delay + jitter).clamp(0.0, self.max_delay_ms as f64)
        } else {
            capped_delay
        };

        Duration::from_millis(delay_with_jitter as u64)
    }

    /// Check if we should retry based on the error and attempt count
    pub fn should_retry(&self, error: &TransportError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }

    /// Run `operation` until it succeeds, fails permanently or the budget is spent
    pub async fn execute<F, T, Fut>(&self, mut operation: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !self.should_retry(&error, attempt) {
                return Err(error);
            }

            let delay = self.calculate_delay(attempt, &error);
            if let Some(timeout_ms) = self.timeout_ms {
                if start.elapsed() + delay > Duration::from_millis(timeout_ms) {
                    return Err(error);
                }
            }

            warn!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fixed_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
            exponential_base: 2.0,
            jitter_factor: 0.0,
            respect_retry_after: false,
            timeout_ms: None,
        }
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let policy = fixed_policy();
        let error = TransportError::Timeout;

        assert_eq!(policy.calculate_delay(0, &error).as_millis(), 100);
        assert_eq!(policy.calculate_delay(1, &error).as_millis(), 200);
        assert_eq!(policy.calculate_delay(2, &error).as_millis(), 400);
        assert_eq!(policy.calculate_delay(3, &error).as_millis(), 800);
        // 1600ms capped at max
        assert_eq!(policy.calculate_delay(4, &error).as_millis(), 1000);
    }

    #[test]
    fn test_jitter_stays_within_cap() {
        let policy = RetryPolicy {
            jitter_factor: 0.5,
            ..fixed_policy()
        };
        for attempt in 0..8 {
            let delay = policy.calculate_delay(attempt, &TransportError::Timeout);
            assert!(delay <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_retry_after_respected() {
        let policy = RetryPolicy {
            respect_retry_after: true,
            max_delay_ms: 10_000,
            ..fixed_policy()
        };
        let error = TransportError::Status {
            status: 429,
            body: String::new(),
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(policy.calculate_delay(0, &error).as_secs(), 5);
    }

    #[test]
    fn test_should_retry_logic() {
        let policy = RetryPolicy::new(2);
        let timeout = TransportError::Timeout;
        assert!(policy.should_retry(&timeout, 0));
        assert!(policy.should_retry(&timeout, 1));
        assert!(!policy.should_retry(&timeout, 2));

        let unauthorized = TransportError::status(401, "bad key");
        assert!(!policy.should_retry(&unauthorized, 0));
    }

    #[tokio::test]
    async fn test_execute_retries_until_success() {
        let policy = RetryPolicy {
            initial_delay_ms: 1,
            ..fixed_policy()
        };
        let calls = AtomicU32::new(0);
        let result = policy
            .execute(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TransportError::status(503, "busy"))
                } else {
                    Ok("done")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_stops_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fixed_policy()
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::status(400, "bad"))
            })
            .await;
        assert!(matches!(result, Err(TransportError::Status { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
