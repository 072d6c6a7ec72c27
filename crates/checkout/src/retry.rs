//! Retrying read-modify-write cycles that lose a commit race.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::error::{Result, ServiceError};

/// Exponential backoff for optimistic-concurrency retries.
///
/// Every attempt must re-read the entities it changes; replaying a stale
/// write would just conflict again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for the delay between retries.
    pub max_delay: Duration,
    /// Growth factor applied to the delay after each retry.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Default backoff with a custom attempt budget (at least one attempt).
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// A single attempt; conflicts surface immediately.
    pub fn no_retry() -> Self {
        Self::with_max_attempts(1)
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        Duration::from_millis(millis as u64).min(self.max_delay)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent.
    ///
    /// Exhausting the budget on conflicts yields [`ServiceError::Conflict`].
    pub async fn run<F, Fut, T>(&self, operation: &'static str, mut attempt_fn: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match attempt_fn(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() => {
                    if attempt >= max_attempts {
                        tracing::error!(operation, attempt, error = %err, "conflicts exhausted retries");
                        return Err(ServiceError::Conflict {
                            operation,
                            attempts: attempt,
                            message: err.to_string(),
                        });
                    }

                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "commit conflicted, retrying"
                    );
                    metrics::counter!("stock_conflict_retries_total", "operation" => operation)
                        .increment(1);
                    sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_store::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn conflict() -> ServiceError {
        StoreError::UniqueViolation {
            kind: "Order".to_string(),
            key: "ORD-2026-000001".to_string(),
        }
        .into()
    }

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    #[test]
    fn delay_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(35),
            multiplier: 2.0,
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(10));
        assert_eq!(policy.delay_after(2), Duration::from_millis(20));
        assert_eq!(policy.delay_after(3), Duration::from_millis(35));
    }

    #[test]
    fn attempt_budget_is_at_least_one() {
        assert_eq!(RetryPolicy::with_max_attempts(0).max_attempts, 1);
        assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
    }

    #[tokio::test]
    async fn retries_conflicts_until_success() {
        let calls = AtomicU32::new(0);
        let result = fast(3)
            .run("test", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(conflict())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_surfaces_conflict() {
        let result: Result<()> = fast(2).run("test", |_| async { Err(conflict()) }).await;

        match result {
            Err(ServiceError::Conflict {
                operation,
                attempts,
                ..
            }) => {
                assert_eq!(operation, "test");
                assert_eq!(attempts, 2);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast(5)
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ServiceError::Validation("nope".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
