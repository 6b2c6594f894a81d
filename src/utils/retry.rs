//! Bounded retry with deterministic exponential backoff.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling for the backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Set the base delay.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before the given retry (1-indexed): `base * 2^(retry-1)`,
    /// capped at `max_delay`. Deliberately jitter-free so the schedule is
    /// reproducible for a given attempt number.
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        // Exponent is clamped so the multiplication cannot overflow before
        // the cap applies.
        let exp = (retry - 1).min(32);
        let scaled = self.base_delay.as_secs_f64() * 2f64.powi(exp as i32);
        self.max_delay.min(Duration::from_secs_f64(scaled))
    }
}

/// Retry result indicating what happened.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded.
    Success(T),
    /// Operation failed; `attempts` counts every failed call.
    Failed { last_error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    /// Convert to a Result, discarding retry information.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success(value) => Ok(value),
            RetryResult::Failed { last_error, .. } => Err(last_error),
        }
    }
}

/// Determines if an error is worth retrying.
pub trait Retryable {
    /// Returns true if the operation should be retried.
    fn is_retryable(&self) -> bool;
}

/// Execute an async operation with bounded exponential backoff.
///
/// Non-retryable errors fail immediately. Retryable errors are retried up to
/// `policy.max_retries` times, sleeping `policy.delay_for(n)` before retry
/// `n`.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> RetryResult<T, E>
where
    E: Retryable + fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut failures = 0u32;

    loop {
        match operation().await {
            Ok(value) => return RetryResult::Success(value),
            Err(error) => {
                failures += 1;
                if !error.is_retryable() || failures > policy.max_retries {
                    return RetryResult::Failed {
                        last_error: error,
                        attempts: failures,
                    };
                }

                let delay = policy.delay_for(failures);
                debug!(
                    attempt = failures,
                    delay_secs = delay.as_secs_f64(),
                    error = %error,
                    "retrying after backoff"
                );
                sleep(delay).await;
            }
        }
    }
}
