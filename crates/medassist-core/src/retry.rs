//! Timeout + retry wrapper for outbound service calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};

/// Per-attempt timeout and a bounded number of retries for transient errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            timeout,
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Run `attempt` until it succeeds, fails permanently, or retries run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, attempt()).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(format!(
                    "{} exceeded {:?}",
                    operation, self.timeout
                ))),
            };

            match outcome {
                Err(e) if retries < self.max_retries && e.is_retryable() => {
                    retries += 1;
                    warn!("{} failed ({}), retry {}/{}", operation, e, retries, self.max_retries);
                    tokio::time::sleep(self.backoff).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceFailure;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(200),
            max_retries,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_transient_failure_retried_once() {
        let calls = AtomicUsize::new(0);
        let result = fast(1)
            .run("embed", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::EmbeddingService(ServiceFailure::http(503, "busy")))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_single_retry() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = fast(1)
            .run("search", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::IndexService(ServiceFailure::transport("reset")))
            })
            .await;
        assert!(matches!(result, Err(Error::IndexService(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = fast(1)
            .run("chat", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::GenerationService(ServiceFailure::http(401, "bad key")))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out() {
        let result: Result<()> = fast(0)
            .run("slow", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(Error::Timeout(msg)) if msg.starts_with("slow")));
    }
}
