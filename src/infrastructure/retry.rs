//! Retry with exponential backoff for Web API calls.

use std::future::Future;
use std::time::Duration;

use crate::domain::{AppError, Result};

/// How often and how patiently to retry a call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per call.
    pub max_retries: u32,
    /// Backoff unit; attempt `n` waits `base_delay * 2^n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Backoff for a zero-based attempt.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Runs `op` until it succeeds or the policy gives up.
///
/// Rate limits wait for the advertised `Retry-After` and never count as the
/// final error; other retryable failures are re-raised on the last attempt.
///
/// # Errors
/// Returns the last non-rate-limit error, any non-retryable error immediately,
/// or `RetriesExhausted` when every attempt was rate limited.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, method: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 0..policy.max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(AppError::RateLimited { retry_after, .. }) => {
                let wait = retry_after.map_or_else(|| policy.backoff(attempt), Duration::from_secs);
                tracing::warn!(
                    method,
                    wait_secs = wait.as_secs(),
                    "Rate limited, waiting before retry"
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) if e.is_retryable() => {
                if attempt + 1 == policy.max_retries {
                    return Err(e);
                }
                tracing::warn!(method, attempt, "API error: {e}. Retrying...");
                tokio::time::sleep(policy.backoff(attempt)).await;
            }
            Err(e) => return Err(e),
        }
    }

    Err(AppError::RetriesExhausted {
        method: method.to_string(),
        attempts: policy.max_retries,
    })
}
