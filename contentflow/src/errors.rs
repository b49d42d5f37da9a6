//! Error types for contentflow.
//!
//! The taxonomy separates what a single stage attempt can fail with
//! ([`StageError`]), what the retry controller reports once it gives up
//! ([`RetryError`]), and what callers of the pipeline and job service see
//! ([`ContentflowError`]).

use crate::core::{FailureKind, JobId, JobStatus};
use std::time::Duration;
use thiserror::Error;

/// The main error type for contentflow operations.
#[derive(Debug, Error)]
pub enum ContentflowError {
    /// The job is not in a state that allows the operation.
    #[error("{0}")]
    InvalidState(#[from] InvalidStateError),

    /// A request failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The pipeline definition is invalid.
    #[error("{0}")]
    Pipeline(#[from] PipelineValidationError),

    /// The persistence or cache layer failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The caller exceeded its submission quota.
    #[error("Rate limit exceeded for '{client}', retry in {retry_after:?}")]
    RateLimited {
        /// Client identifier.
        client: String,
        /// Time until the window resets.
        retry_after: Duration,
    },

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ContentflowError {
    /// Returns true when the error is a missing job.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound(_)))
    }
}

/// Failure of a single stage attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// Network error, rate limit or other condition worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The attempt exceeded its time budget.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid input, content-policy rejection or other non-retryable failure.
    #[error("permanent failure: {0}")]
    Permanent(String),

    /// The attempt was cancelled.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl StageError {
    /// Creates a transient error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Creates a permanent error.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }

    /// Returns true if the retry controller may try again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }

    /// Classification recorded on a failed job.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transient(_) => FailureKind::Transient,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Permanent(_) => FailureKind::Permanent,
            Self::Cancelled(_) => FailureKind::Cancelled,
        }
    }
}

/// Reported by the retry controller when it stops without a result.
///
/// Every variant carries the number of attempts made and the time spent.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All attempts failed with retryable errors.
    #[error("gave up after {attempts} attempts in {elapsed:?}: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: usize,
        /// Time spent across attempts and delays.
        elapsed: Duration,
        /// The last error observed.
        last: E,
    },

    /// An attempt failed with an error the predicate marked non-retryable.
    #[error("non-retryable failure on attempt {attempts} after {elapsed:?}: {error}")]
    NotRetryable {
        /// Attempts made.
        attempts: usize,
        /// Time spent.
        elapsed: Duration,
        /// The error that stopped the loop.
        error: E,
    },

    /// Cancellation was requested during an attempt or a delay.
    #[error("cancelled after {attempts} attempts in {elapsed:?}")]
    Cancelled {
        /// Attempts started.
        attempts: usize,
        /// Time spent.
        elapsed: Duration,
        /// Error of the last finished attempt, if any.
        last: Option<E>,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made.
    #[must_use]
    pub fn attempts(&self) -> usize {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::NotRetryable { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// Time spent before giving up.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Exhausted { elapsed, .. }
            | Self::NotRetryable { elapsed, .. }
            | Self::Cancelled { elapsed, .. } => *elapsed,
        }
    }

    /// Returns true if the loop stopped because of cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The last operation error, if an attempt finished.
    #[must_use]
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            Self::NotRetryable { error, .. } => Some(error),
            Self::Cancelled { last, .. } => last.as_ref(),
        }
    }

    /// Consumes the error, returning the last operation error.
    #[must_use]
    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            Self::NotRetryable { error, .. } => Some(error),
            Self::Cancelled { last, .. } => last,
        }
    }
}

/// Raised when the sequencer or the job service is asked to act on a job
/// whose status does not allow it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job {job_id} is '{status}': {message}")]
pub struct InvalidStateError {
    /// The job.
    pub job_id: JobId,
    /// Its status when the operation was attempted.
    pub status: JobStatus,
    /// What was refused.
    pub message: String,
}

impl InvalidStateError {
    /// Creates a new invalid-state error.
    #[must_use]
    pub fn new(job_id: JobId, status: JobStatus, message: impl Into<String>) -> Self {
        Self {
            job_id,
            status,
            message: message.into(),
        }
    }
}

/// A request field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    /// The offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// The stage list handed to the pipeline builder is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}

/// Persistence and cache failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No job with that identifier.
    #[error("job {0} not found")]
    NotFound(JobId),

    /// The backing store failed.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for [`crate::config::Settings`].
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment variable holds an unusable value.
    #[error("Invalid environment variable {name}: {message}")]
    Env {
        /// Variable name.
        name: String,
        /// What is wrong with it.
        message: String,
    },

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_retryable() {
        assert!(StageError::transient("503").is_retryable());
        assert!(StageError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!StageError::permanent("policy").is_retryable());
        assert!(!StageError::Cancelled("user".into()).is_retryable());
    }

    #[test]
    fn test_stage_error_kind() {
        assert_eq!(StageError::transient("x").kind(), FailureKind::Transient);
        assert_eq!(
            StageError::Timeout(Duration::from_secs(1)).kind(),
            FailureKind::Timeout
        );
        assert_eq!(StageError::permanent("x").kind(), FailureKind::Permanent);
        assert_eq!(StageError::Cancelled("x".into()).kind(), FailureKind::Cancelled);
    }

    #[test]
    fn test_retry_error_accessors() {
        let err = RetryError::Exhausted {
            attempts: 3,
            elapsed: Duration::from_millis(30),
            last: StageError::transient("rate limited"),
        };
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.elapsed(), Duration::from_millis(30));
        assert!(!err.is_cancelled());
        assert!(err.to_string().contains("gave up after 3 attempts"));
        assert_eq!(err.into_last_error(), Some(StageError::transient("rate limited")));
    }

    #[test]
    fn test_cancelled_retry_error_without_attempt() {
        let err: RetryError<StageError> = RetryError::Cancelled {
            attempts: 1,
            elapsed: Duration::ZERO,
            last: None,
        };
        assert!(err.is_cancelled());
        assert!(err.last_error().is_none());
    }

    #[test]
    fn test_invalid_state_display() {
        let id = JobId::new();
        let err = InvalidStateError::new(id, JobStatus::Completed, "only pending jobs can be run");
        let text = err.to_string();
        assert!(text.contains("completed"));
        assert!(text.contains(&id.to_string()));
    }

    #[test]
    fn test_contentflow_error_from() {
        let err: ContentflowError = StoreError::NotFound(JobId::new()).into();
        assert!(err.is_not_found());

        let err: ContentflowError = ValidationError::new("topic", "too short").into();
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "invalid topic: too short");
    }
}
