//! Bounded-backoff retry for directory operations.

use crate::error::{DirectoryError, DirectoryResult};
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy configuration.
///
/// Retries only transient failures (connection loss, timeouts, 5xx, rate
/// limiting) with exponential backoff; the attempt cap is deliberately
/// small so a flaky operation is skipped instead of stalling the run.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per operation (1 = no retries).
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds.
    pub base_delay_ms: u64,
    /// Backoff delay cap in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt cap and base delay; the
    /// delay cap defaults to ten seconds.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms: 10_000,
        }
    }

    /// Whether another attempt should be made after `attempt` failures.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &DirectoryError) -> bool {
        attempt + 1 < self.max_attempts && error.is_retryable()
    }

    /// Backoff before attempt `attempt + 1`.
    ///
    /// A rate-limit response carrying `Retry-After` overrides the
    /// exponential schedule (still capped at `max_delay_ms`).
    #[must_use]
    pub fn delay_for(&self, attempt: u32, error: &DirectoryError) -> Duration {
        let ms = if let DirectoryError::RateLimited {
            retry_after_secs: Some(secs),
        } = error
        {
            secs.saturating_mul(1000).min(self.max_delay_ms)
        } else {
            self.base_delay_ms
                .saturating_mul(2u64.saturating_pow(attempt))
                .min(self.max_delay_ms)
        };
        Duration::from_millis(ms)
    }

    /// Run `f` until it succeeds, fails non-retryably, or the attempt cap
    /// is reached.  Exhaustion is wrapped in
    /// [`DirectoryError::RetriesExhausted`] so callers can still classify
    /// the underlying failure.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut f: F) -> DirectoryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = DirectoryResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, attempt = attempt + 1, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !self.should_retry(attempt, &error) {
                        if error.is_retryable() {
                            warn!(operation, attempts = attempt + 1, error = %error, "retries exhausted");
                            return Err(DirectoryError::RetriesExhausted {
                                operation: operation.to_string(),
                                attempts: attempt + 1,
                                source: Box::new(error),
                            });
                        }
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt, &error);
                    debug!(
                        operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
