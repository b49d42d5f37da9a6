//! The retry loop.

use super::RetryPolicy;
use crate::cancellation::CancellationToken;
use crate::errors::RetryError;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Successful result of a retried operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome<T> {
    /// The value produced by the successful attempt.
    pub value: T,
    /// Attempts made, including the successful one.
    pub attempts: usize,
    /// Time spent across attempts and delays.
    pub elapsed: Duration,
    /// Delays slept before each retry, in order.
    pub delays: Vec<Duration>,
}

/// A configured retry controller.
///
/// Cheap to clone; the policy is shared read-only. Dropping the future
/// returned by [`Retrier::run`] aborts the in-flight attempt and any pending
/// delay. With a cancellation token attached, cancelling the token does the
/// same and yields [`RetryError::Cancelled`].
#[derive(Debug, Clone)]
pub struct Retrier {
    policy: Arc<RetryPolicy>,
    cancel: Option<CancellationToken>,
    operation: String,
}

impl Retrier {
    /// Creates a controller for the given policy.
    #[must_use]
    pub fn new(policy: impl Into<Arc<RetryPolicy>>) -> Self {
        Self {
            policy: policy.into(),
            cancel: None,
            operation: "operation".to_string(),
        }
    }

    /// Names the operation in log records.
    #[must_use]
    pub fn named(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Returns the policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation`, retrying every error.
    pub async fn run<T, E, F, Fut>(&self, operation: F) -> Result<RetryOutcome<T>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_if(operation, |_| true).await
    }

    /// Runs `operation`, retrying only errors `is_retryable` accepts.
    ///
    /// A rejected error is returned at once without consuming the remaining
    /// attempts.
    pub async fn run_if<T, E, F, Fut, P>(
        &self,
        mut operation: F,
        is_retryable: P,
    ) -> Result<RetryOutcome<T>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let start = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut delays = Vec::new();
        let mut last: Option<E> = None;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = match &self.cancel {
                Some(token) => {
                    if token.is_cancelled() {
                        return Err(RetryError::Cancelled {
                            attempts: attempt - 1,
                            elapsed: start.elapsed(),
                            last,
                        });
                    }
                    tokio::select! {
                        biased;
                        () = token.cancelled() => {
                            debug!(operation = %self.operation, attempt, "Attempt aborted by cancellation");
                            return Err(RetryError::Cancelled {
                                attempts: attempt,
                                elapsed: start.elapsed(),
                                last,
                            });
                        }
                        result = operation() => result,
                    }
                }
                None => operation().await,
            };

            let err = match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = %self.operation, attempts = attempt, "Succeeded after retry");
                    }
                    return Ok(RetryOutcome {
                        value,
                        attempts: attempt,
                        elapsed: start.elapsed(),
                        delays,
                    });
                }
                Err(err) => err,
            };

            if !is_retryable(&err) {
                warn!(
                    operation = %self.operation,
                    attempt,
                    error = %err,
                    "Non-retryable failure"
                );
                return Err(RetryError::NotRetryable {
                    attempts: attempt,
                    elapsed: start.elapsed(),
                    error: err,
                });
            }

            if attempt >= max_attempts {
                error!(
                    operation = %self.operation,
                    attempts = attempt,
                    error = %err,
                    "Retries exhausted"
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    elapsed: start.elapsed(),
                    last: err,
                });
            }

            let delay = self.policy.delay_for(attempt + 1);
            warn!(
                operation = %self.operation,
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Attempt failed, retrying"
            );
            last = Some(err);
            delays.push(delay);

            match &self.cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        () = token.cancelled() => {
                            return Err(RetryError::Cancelled {
                                attempts: attempt,
                                elapsed: start.elapsed(),
                                last,
                            });
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
        }
    }
}

/// Runs `operation` under `policy`, retrying every error.
pub async fn retry<T, E, F, Fut>(operation: F, policy: &RetryPolicy) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    Retrier::new(policy.clone())
        .run(operation)
        .await
        .map(|outcome| outcome.value)
}

/// Runs `operation` under `policy`, retrying only errors `is_retryable` accepts.
pub async fn retry_if<T, E, F, Fut, P>(
    operation: F,
    policy: &RetryPolicy,
    is_retryable: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    Retrier::new(policy.clone())
        .run_if(operation, is_retryable)
        .await
        .map(|outcome| outcome.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StageError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(max_attempts)
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(1000))
            .with_jitter(false)
    }

    fn failing_n_times(
        calls: &Arc<AtomicUsize>,
        failures: usize,
    ) -> impl FnMut() -> std::future::Ready<Result<&'static str, StageError>> {
        let calls = calls.clone();
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if n <= failures {
                Err(StageError::transient(format!("attempt {n}")))
            } else {
                Ok("done")
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try() {
        let calls = Arc::new(AtomicUsize::new(0));
        let outcome = Retrier::new(policy(3))
            .run(failing_n_times(&calls, 0))
            .await
            .unwrap();

        assert_eq!(outcome.value, "done");
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.delays.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_n_minus_one_failures() {
        for max_attempts in 1..=6 {
            let calls = Arc::new(AtomicUsize::new(0));
            let policy = policy(max_attempts);
            let outcome = Retrier::new(policy.clone())
                .run(failing_n_times(&calls, max_attempts - 1))
                .await
                .unwrap();

            assert_eq!(outcome.attempts, max_attempts);
            assert_eq!(outcome.delays.len(), max_attempts - 1);
            for pair in outcome.delays.windows(2) {
                assert!(pair[1] <= pair[0].mul_f64(policy.backoff_multiplier));
            }
            assert!(outcome.delays.iter().all(|d| *d <= policy.max_delay));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_follow_backoff_and_cap() {
        let calls = Arc::new(AtomicUsize::new(0));
        let outcome = Retrier::new(policy(6))
            .run(failing_n_times(&calls, 5))
            .await
            .unwrap();

        let expected: Vec<Duration> = [100, 200, 400, 800, 1000]
            .into_iter()
            .map(Duration::from_millis)
            .collect();
        assert_eq!(outcome.delays, expected);
        assert!(outcome.elapsed >= Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_elapsed_includes_delays() {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = Retrier::new(policy(3))
            .run(failing_n_times(&calls, 10))
            .await
            .unwrap_err();

        assert_eq!(err.attempts(), 3);
        assert!(err.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_jittered_delays_stay_in_bounds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = policy(5).with_jitter(true);
        let outcome = Retrier::new(policy.clone())
            .run(failing_n_times(&calls, 4))
            .await
            .unwrap();

        for (i, delay) in outcome.delays.iter().enumerate() {
            let base = policy.base_delay(i + 2);
            assert!(*delay >= base.mul_f64(0.5));
            assert!(*delay <= base.mul_f64(1.5).min(policy.max_delay));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_all_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = Retrier::new(policy(4))
            .run(failing_n_times(&calls, usize::MAX))
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::Exhausted { .. }));
        assert_eq!(err.attempts(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(err.into_last_error(), Some(StageError::transient("attempt 4")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_returns_after_first_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let err = Retrier::new(policy(5))
            .run_if(
                move || {
                    c.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(StageError::permanent("policy violation")) }
                },
                StageError::is_retryable,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::NotRetryable { .. }));
        assert_eq!(err.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_pending_delay() {
        let token = CancellationToken::new();
        let retrier = Retrier::new(policy(3).with_initial_delay(Duration::from_secs(600))
            .with_max_delay(Duration::from_secs(600)))
            .with_cancellation(token.clone());

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel("user request");
            })
        };

        let calls = Arc::new(AtomicUsize::new(0));
        let started = tokio::time::Instant::now();
        let err = retrier.run(failing_n_times(&calls, usize::MAX)).await.unwrap_err();
        canceller.await.unwrap();

        assert!(err.is_cancelled());
        assert_eq!(err.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_in_flight_attempt() {
        let token = CancellationToken::new();
        let retrier = Retrier::new(policy(3)).with_cancellation(token.clone());

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                token.cancel("operator");
            })
        };

        let err = retrier
            .run(|| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok::<_, StageError>(())
            })
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(err.is_cancelled());
        assert!(err.last_error().is_none());
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_runs_nothing() {
        let token = CancellationToken::new();
        token.cancel("before start");
        let calls = Arc::new(AtomicUsize::new(0));

        let err = Retrier::new(policy(3))
            .with_cancellation(token)
            .run(failing_n_times(&calls, 0))
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.attempts(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_free_functions() {
        let calls = Arc::new(AtomicUsize::new(0));
        let value = retry(failing_n_times(&calls, 2), &policy(3)).await.unwrap();
        assert_eq!(value, "done");

        let calls = Arc::new(AtomicUsize::new(0));
        let err = retry_if(failing_n_times(&calls, 2), &policy(3), |_| false)
            .await
            .unwrap_err();
        assert_eq!(err.attempts(), 1);
    }
}
