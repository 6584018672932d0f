//! Exponential backoff for rate-limited Azure calls.
//!
//! Only [`AzureError::RateLimited`] is retried; every other outcome is
//! returned to the caller immediately.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::AzureError;

/// Retry policy for rate-limited operations.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Factor applied to the delay after each further attempt.
    pub multiplier: f64,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the zero-based `attempt` failed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }

        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are used up. On exhaustion the last rate-limit error is
    /// returned.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, AzureError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AzureError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match op().await {
                Err(AzureError::RateLimited) if attempt + 1 < max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        operation = operation,
                        attempt = attempt + 1,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited by Azure, will retry after delay"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(AzureError::RateLimited) => {
                    warn!(
                        operation = operation,
                        attempts = attempt + 1,
                        "Rate limited on every attempt, giving up"
                    );
                    return Err(AzureError::RateLimited);
                },
                result => {
                    if attempt > 0 && result.is_ok() {
                        debug!(
                            operation = operation,
                            attempt = attempt + 1,
                            "Request succeeded after retry"
                        );
                    }
                    return result;
                },
            }
        }
    }
}
