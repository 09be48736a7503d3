//! Retry with a fixed backoff
//!
//! Only transient store failures are retried.

use std::time::Duration;

use crate::error::{Error, Result};

/// Retry policy: a fixed number of attempts separated by a constant delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryConfig {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }
}

/// Retry a fallible async operation after a fixed delay
///
/// # Example
/// ```ignore
/// let result = retry_with_backoff(
///     &config,
///     || async { client.complete_multipart_upload(..).await },
///     is_retryable_error,
/// ).await;
/// ```
pub async fn retry_with_backoff<T, F, Fut, R>(
    config: &RetryConfig,
    mut operation: F,
    is_retryable: R,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    R: Fn(&Error) -> bool,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= config.max_attempts || !is_retryable(&e) {
                    return Err(e);
                }

                tracing::warn!(
                    attempt = attempt,
                    backoff_ms = config.delay.as_millis(),
                    error = %e,
                    "Retrying after transient error"
                );

                tokio::time::sleep(config.delay).await;
            }
        }
    }
}

/// Only [`Error::Transient`] is worth retrying; the S3 backend classifies
/// throttling, 5xx and dispatch failures as transient.
pub fn is_retryable_error(error: &Error) -> bool {
    matches!(error, Error::Transient(_))
}
