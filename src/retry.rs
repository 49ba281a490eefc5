//! Bounded retry with a fixed delay
//!
//! Every external operation of a migration (Drive download, release creation,
//! asset upload) runs through [`with_retry`]: an explicit loop with an attempt
//! counter, a fixed pause between attempts and no pause before the first one.
//! Errors decide for themselves whether another attempt is worthwhile via
//! [`IsRetryable`].
//!
//! # Example
//!
//! ```no_run
//! use drive_to_release::retry::{IsRetryable, with_retry};
//! use drive_to_release::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! with_retry(&config, "upload", || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{FetchError, PublishError};
use std::future::Future;

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        // Drive failures are flaky in many ways; only a permission problem is final
        !matches!(self, FetchError::AccessDenied { .. })
    }
}

impl IsRetryable for PublishError {
    fn is_retryable(&self) -> bool {
        match self {
            // Server errors and rate limiting
            PublishError::CreateRejected { status, .. } => *status >= 500 || *status == 429,
            // Server errors and request timeout
            PublishError::UploadRejected { status, .. } => *status >= 500 || *status == 408,
            PublishError::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            PublishError::InvalidResponse(_) => false,
            PublishError::Io(_) => false,
        }
    }
}

/// Execute an async operation, retrying transient failures with a fixed delay
///
/// `config.max_attempts` is the total number of calls, including the first
/// (a value of 0 still calls the operation once). The delay is only slept
/// between attempts.
///
/// # Returns
///
/// The first successful result, or the last error once the budget is spent or
/// a non-retryable error occurs.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempts = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                tracing::warn!(
                    operation = operation_name,
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = config.delay.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(config.delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        operation = operation_name,
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(
                        operation = operation_name,
                        error = %e,
                        "Operation failed with non-retryable error"
                    );
                }
                return Err(e);
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::Transient => write!(f, "transient error"),
                TestError::Permanent => write!(f, "permanent error"),
            }
        }
    }

    impl IsRetryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_success_no_retry() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(3), "test", || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1, "should only call once");
    }

    #[tokio::test]
    async fn test_retry_transient_then_succeed() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(3), "test", || {
            let counter = counter_clone.clone();
            async move {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(TestError::Transient)
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn attempts_never_exceed_budget() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(3), "test", || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TestError::Transient)
            }
        })
        .await;

        assert!(matches!(result, Err(TestError::Transient)));
        assert_eq!(
            counter.load(Ordering::SeqCst),
            3,
            "max_attempts counts the first call"
        );
    }

    #[tokio::test]
    async fn test_permanent_error_no_retry() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(3), "test", || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TestError::Permanent)
            }
        })
        .await;

        assert!(matches!(result, Err(TestError::Permanent)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_max_attempts_still_calls_once() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let _ = with_retry(&fast_config(0), "test", || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TestError::Transient)
            }
        })
        .await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delay_is_fixed_and_only_between_attempts() {
        let config = RetryConfig {
            max_attempts: 3,
            delay: Duration::from_millis(50),
        };

        let timestamps = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let ts_clone = timestamps.clone();
        let start = std::time::Instant::now();

        let _ = with_retry(&config, "test", || {
            let ts = ts_clone.clone();
            async move {
                ts.lock().await.push(std::time::Instant::now());
                Err::<i32, _>(TestError::Transient)
            }
        })
        .await;

        let ts = timestamps.lock().await;
        assert_eq!(ts.len(), 3);

        assert!(
            ts[0].duration_since(start) < Duration::from_millis(40),
            "first attempt must not be delayed"
        );

        let gap1 = ts[1].duration_since(ts[0]);
        let gap2 = ts[2].duration_since(ts[1]);
        assert!(gap1 >= Duration::from_millis(45), "gap1 was {gap1:?}");
        assert!(gap2 >= Duration::from_millis(45), "gap2 was {gap2:?}");
        // Fixed, not exponential: the second gap must not be anywhere near double
        assert!(gap2 < Duration::from_millis(95), "gap2 was {gap2:?}");
    }

    #[test]
    fn access_denied_is_not_retryable() {
        let err = FetchError::AccessDenied {
            file_id: "abc".to_string(),
            reason: "HTTP 403".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn other_fetch_failures_are_retryable() {
        assert!(
            FetchError::EmptyFile {
                path: PathBuf::from("x.mp4")
            }
            .is_retryable()
        );
        assert!(
            FetchError::MissingFile {
                path: PathBuf::from("x.mp4")
            }
            .is_retryable()
        );
        assert!(
            FetchError::Status {
                file_id: "abc".to_string(),
                status: 500
            }
            .is_retryable()
        );
        assert!(
            FetchError::ConfirmationNotFound {
                file_id: "abc".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn release_creation_retries_only_server_errors_and_rate_limits() {
        let rejected = |status| PublishError::CreateRejected {
            tag: "video-x".to_string(),
            status,
            body: String::new(),
        };

        assert!(rejected(500).is_retryable());
        assert!(rejected(503).is_retryable());
        assert!(rejected(429).is_retryable());
        assert!(!rejected(422).is_retryable(), "validation failure is final");
        assert!(!rejected(401).is_retryable());
        assert!(!rejected(408).is_retryable());
    }

    #[test]
    fn upload_retries_only_server_errors_and_request_timeout() {
        let rejected = |status| PublishError::UploadRejected {
            asset: "x.mp4".to_string(),
            status,
            body: String::new(),
        };

        assert!(rejected(502).is_retryable());
        assert!(rejected(408).is_retryable());
        assert!(!rejected(429).is_retryable());
        assert!(!rejected(422).is_retryable());
        assert!(!rejected(404).is_retryable());
    }

    #[test]
    fn invalid_response_is_not_retryable() {
        assert!(!PublishError::InvalidResponse("missing id".to_string()).is_retryable());
    }
}
