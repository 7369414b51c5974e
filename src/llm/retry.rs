//! Bounded retry with exponential backoff and jitter.
//!
//! Every outbound provider call in the pipeline is wrapped in a
//! `RetryPolicy`. The policy retries only transient failures
//! (`LlmError::is_transient`); authentication and configuration errors
//! surface immediately to the caller.

use std::future::Future;
use std::time::Duration;

use rand::RngExt;

use crate::error::LlmError;

/// Default maximum number of attempts (initial call + retries).
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff.
const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Default cap on a single backoff delay.
const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Default jitter fraction applied to each delay.
const DEFAULT_JITTER: f64 = 0.25;

/// Retry policy for collaborator calls.
///
/// Delays grow as `base * 2^(attempt-1)`, capped at `max_delay`, with a
/// random jitter of up to `jitter` of the delay added on top.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            jitter: DEFAULT_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with an explicit attempt budget.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Set the base backoff delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the backoff delay cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter fraction (0.0 disables jitter).
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Returns the configured attempt budget.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Compute the backoff delay before the given retry attempt (1-based).
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << (attempt - 1).min(16));
        let capped = exp.min(self.max_delay);
        if self.jitter <= 0.0 {
            return capped;
        }
        let jitter_ms = (capped.as_millis() as f64 * self.jitter) as u64;
        let extra = if jitter_ms > 0 {
            rand::rng().random_range(0..=jitter_ms)
        } else {
            0
        };
        capped + Duration::from_millis(extra)
    }

    /// Run `operation`, retrying transient failures up to the attempt budget.
    ///
    /// Fatal errors (auth, parse, client-side API errors) are returned on
    /// the first occurrence without sleeping.
    pub async fn run<T, F, Fut>(&self, op_name: &str, operation: F) -> Result<T, LlmError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.delay_for(attempt);
                tracing::debug!(
                    op = op_name,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
            }

            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if err.is_transient() {
                        tracing::warn!(
                            op = op_name,
                            attempt = attempt + 1,
                            max_attempts = self.max_attempts,
                            error = %err,
                            "Transient error, will retry"
                        );
                        last_error = Some(err);
                    } else {
                        return Err(err);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LlmError::RequestFailed("Max retries exceeded with no error captured".to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts)
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
            .with_jitter(0.0)
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, LlmError>(42) }
            })
            .await;
        assert_eq!(result.expect("should succeed"), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(LlmError::RateLimited("busy".to_string()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;
        assert_eq!(result.expect("should succeed"), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_attempt_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = fast_policy(3)
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(LlmError::ApiError {
                        code: 500,
                        message: "boom".to_string(),
                    })
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auth_error_is_never_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = fast_policy(5)
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LlmError::Auth("bad key".to_string())) }
            })
            .await;
        assert!(matches!(result, Err(LlmError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "auth errors must fail fast");
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::new(5)
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(350))
            .with_jitter(0.0);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(4), Duration::from_millis(350));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = RetryPolicy::new(3)
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(100))
            .with_jitter(0.5);
        for _ in 0..50 {
            let d = policy.delay_for(1);
            assert!(d >= Duration::from_millis(100));
            assert!(d <= Duration::from_millis(150));
        }
    }
}
