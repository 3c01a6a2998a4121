//! Uniform retry wrapper for rate-limited/transient source errors.
//!
//! A 429 with `Retry-After`, a 5xx response, and a connect/read timeout all
//! collapse into [`ingest_core::IngestError::RateLimited`] at the client
//! boundary so this one wrapper handles all three.

use ingest_core::{IngestError, IngestResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Backoff used when the source didn't supply a `Retry-After` value.
    pub default_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            default_backoff: Duration::from_secs(10),
        }
    }
}

/// Run `op`, retrying on [`IngestError::RateLimited`] up to
/// `policy.max_attempts` times, sleeping for the source's requested
/// `retry_after` or the policy's default backoff between attempts. Any
/// other error is returned immediately.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> IngestResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = IngestResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(IngestError::RateLimited { retry_after }) if attempt < policy.max_attempts => {
                let wait = retry_after.unwrap_or(policy.default_backoff);
                warn!(attempt, wait_ms = wait.as_millis() as u64, "rate limited, retrying");
                tokio::time::sleep(wait).await;
            }
            Err(other) => return Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            default_backoff: Duration::from_millis(1),
        };

        let result = with_retry(&policy, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(IngestError::RateLimited { retry_after: None })
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 2,
            default_backoff: Duration::from_millis(1),
        };

        let result: IngestResult<()> =
            with_retry(&policy, || async { Err(IngestError::RateLimited { retry_after: None }) })
                .await;

        assert!(matches!(result, Err(IngestError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn non_retryable_errors_return_immediately() {
        let policy = RetryPolicy::default();
        let result: IngestResult<()> = with_retry(&policy, || async {
            Err(IngestError::ServiceAccountOnly)
        })
        .await;
        assert!(matches!(result, Err(IngestError::ServiceAccountOnly)));
    }
}
