//! Retry decorator for stages.

use super::{Retrier, RetryPolicy};
use crate::core::{ContentJob, JobStatus, StageOutput};
use crate::errors::{RetryError, StageError};
use crate::stages::Stage;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Wraps a stage so each `run` is retried under a policy.
///
/// The wrapper keeps the inner stage's name and status, and reports the
/// inner stage's last error when it gives up, so callers see the same
/// contract with or without it.
#[derive(Debug)]
pub struct RetryingStage<S> {
    inner: S,
    retrier: Retrier,
    attempt_timeout: Option<Duration>,
}

impl<S: Stage> RetryingStage<S> {
    /// Wraps `inner` with `policy`.
    pub fn new(inner: S, policy: impl Into<Arc<RetryPolicy>>) -> Self {
        let retrier = Retrier::new(policy).named(inner.name().to_string());
        Self {
            inner,
            retrier,
            attempt_timeout: None,
        }
    }

    /// Bounds every attempt; an attempt that runs out is a retryable timeout.
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Returns the wrapped stage.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

/// Runs one attempt of `stage`, bounded by `timeout` when set.
pub(crate) async fn run_attempt(
    stage: &dyn Stage,
    job: &ContentJob,
    timeout: Option<Duration>,
) -> Result<StageOutput, StageError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, stage.run(job))
            .await
            .unwrap_or(Err(StageError::Timeout(limit))),
        None => stage.run(job).await,
    }
}

/// Collapses a retry failure back into the stage error it carries.
pub(crate) fn into_stage_error(err: RetryError<StageError>) -> StageError {
    match err {
        RetryError::Exhausted { last, .. } => last,
        RetryError::NotRetryable { error, .. } => error,
        RetryError::Cancelled { attempts, .. } => {
            StageError::Cancelled(format!("cancelled after {attempts} attempts"))
        }
    }
}

#[async_trait]
impl<S: Stage> Stage for RetryingStage<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn status(&self) -> JobStatus {
        self.inner.status()
    }

    async fn run(&self, job: &ContentJob) -> Result<StageOutput, StageError> {
        self.retrier
            .run_if(
                || run_attempt(&self.inner, job, self.attempt_timeout),
                StageError::is_retryable,
            )
            .await
            .map(|outcome| outcome.value)
            .map_err(into_stage_error)
    }
}
