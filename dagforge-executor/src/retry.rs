//! ABOUTME: Retry-with-backoff helper shared by every kind executor via dispatch
//! ABOUTME: delay(attempt) = backoff_seconds * 2^(attempt-1); attempt is 1-indexed

use std::future::Future;
use std::time::Duration;

use dagforge_core::node::RetryPolicy;

use crate::error::{ExecutorError, Result};

/// Run `attempt_fn` up to `policy.retries + 1` times, sleeping
/// `policy.delay_for_attempt(n)` between attempts, stopping early on the
/// first success or on a non-retriable error.
///
/// Returns the number of retries actually used alongside the outcome.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, mut attempt_fn: F) -> (Result<T>, u32)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1u32;
    loop {
        let outcome = attempt_fn(attempt).await;
        match outcome {
            Ok(value) => return (Ok(value), attempt - 1),
            Err(err) => {
                let retries_used = attempt - 1;
                if retries_used >= policy.retries || !err.is_retriable() {
                    return (Err(err), retries_used);
                }
                let delay = policy.delay_for_attempt(attempt);
                if delay > 0.0 {
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                }
                attempt += 1;
            }
        }
    }
}

/// Race `fut` against a `timeout_seconds` deadline when one is set.
pub async fn with_timeout<Fut, T>(timeout_seconds: Option<f64>, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match timeout_seconds {
        Some(seconds) if seconds > 0.0 => {
            match tokio::time::timeout(Duration::from_secs_f64(seconds), fut).await {
                Ok(result) => result,
                Err(_) => Err(ExecutorError::Timeout(seconds)),
            }
        }
        _ => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let policy = RetryPolicy {
            retries: 3,
            backoff_seconds: 0.0,
        };
        let calls = AtomicU32::new(0);
        let (result, retries_used) = with_retry(&policy, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ExecutorError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(retries_used, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_retriable_errors_until_success() {
        let policy = RetryPolicy {
            retries: 3,
            backoff_seconds: 0.0,
        };
        let (result, retries_used) = with_retry(&policy, |attempt| async move {
            if attempt < 3 {
                Err(ExecutorError::Runtime("transient".into()))
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(retries_used, 2);
    }

    #[tokio::test]
    async fn non_retriable_error_stops_immediately() {
        let policy = RetryPolicy {
            retries: 5,
            backoff_seconds: 0.0,
        };
        let calls = AtomicU32::new(0);
        let (result, retries_used) = with_retry(&policy, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>(ExecutorError::Validation("bad".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(retries_used, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_retries_then_returns_last_error() {
        let policy = RetryPolicy {
            retries: 2,
            backoff_seconds: 0.0,
        };
        let (result, retries_used) = with_retry(&policy, |_attempt| async {
            Err::<i32, _>(ExecutorError::Timeout(1.0))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(retries_used, 2);
    }

    #[tokio::test]
    async fn timeout_wraps_slow_future() {
        let result: Result<i32> = with_timeout(Some(0.01), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1)
        })
        .await;
        assert!(matches!(result, Err(ExecutorError::Timeout(_))));
    }

    #[tokio::test]
    async fn no_timeout_set_runs_to_completion() {
        let result: Result<i32> = with_timeout(None, async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
