//! Stage trait and implementations.
//!
//! Stages are the units of work the pipeline sequencer runs in order. Each
//! one reads the current job state and returns the fields it produced.

use crate::core::{ContentJob, JobStatus, StageOutput};
use crate::errors::StageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::future::Future;
use std::marker::PhantomData;
use std::str::FromStr;

/// Trait for pipeline stages.
///
/// Implementations must not mutate the job themselves; the sequencer merges
/// the returned [`StageOutput`] and persists it.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// The in-progress status the job carries while this stage runs.
    fn status(&self) -> JobStatus;

    /// Runs one attempt of the stage against the current job state.
    async fn run(&self, job: &ContentJob) -> Result<StageOutput, StageError>;
}

/// The standard content stages, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Gathers facts about the topic.
    Research,
    /// Produces the outline.
    Plan,
    /// Writes the first draft.
    Write,
    /// Polishes the draft into the final content.
    Edit,
}

impl StageKind {
    /// The standard order.
    pub const STANDARD: [Self; 4] = [Self::Research, Self::Plan, Self::Write, Self::Edit];

    /// Default stage name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Plan => "plan",
            Self::Write => "write",
            Self::Edit => "edit",
        }
    }

    /// The in-progress status associated with the stage.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Research => JobStatus::Researching,
            Self::Plan => JobStatus::Planning,
            Self::Write => JobStatus::Writing,
            Self::Edit => JobStatus::Editing,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "research" => Ok(Self::Research),
            "plan" | "planning" => Ok(Self::Plan),
            "write" | "writing" => Ok(Self::Write),
            "edit" | "editing" => Ok(Self::Edit),
            other => Err(format!("unknown stage kind: {other}")),
        }
    }
}

/// A stage backed by a synchronous function.
pub struct FnStage<F>
where
    F: Fn(&ContentJob) -> Result<StageOutput, StageError> + Send + Sync,
{
    name: String,
    status: JobStatus,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&ContentJob) -> Result<StageOutput, StageError> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, status: JobStatus, func: F) -> Self {
        Self {
            name: name.into(),
            status,
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&ContentJob) -> Result<StageOutput, StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStage")
            .field("name", &self.name)
            .field("status", &self.status)
            .finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&ContentJob) -> Result<StageOutput, StageError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    async fn run(&self, job: &ContentJob) -> Result<StageOutput, StageError> {
        (self.func)(job)
    }
}

/// A stage backed by an async function.
///
/// The function receives a snapshot of the job, so the future it returns
/// may be `'static`.
pub struct AsyncFnStage<F, Fut>
where
    F: Fn(ContentJob) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageOutput, StageError>> + Send,
{
    name: String,
    status: JobStatus,
    func: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnStage<F, Fut>
where
    F: Fn(ContentJob) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageOutput, StageError>> + Send,
{
    /// Creates a new async function-based stage.
    pub fn new(name: impl Into<String>, status: JobStatus, func: F) -> Self {
        Self {
            name: name.into(),
            status,
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> Debug for AsyncFnStage<F, Fut>
where
    F: Fn(ContentJob) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageOutput, StageError>> + Send,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFnStage")
            .field("name", &self.name)
            .field("status", &self.status)
            .finish()
    }
}

#[async_trait]
impl<F, Fut> Stage for AsyncFnStage<F, Fut>
where
    F: Fn(ContentJob) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageOutput, StageError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    async fn run(&self, job: &ContentJob) -> Result<StageOutput, StageError> {
        (self.func)(job.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ContentRequest;

    fn job() -> ContentJob {
        ContentJob::new(ContentRequest::new("AI adoption"))
    }

    #[tokio::test]
    async fn test_fn_stage() {
        let stage = FnStage::new("draft", JobStatus::Writing, |job: &ContentJob| {
            Ok(StageOutput::draft(format!("About {}", job.request.topic)))
        });

        assert_eq!(stage.name(), "draft");
        assert_eq!(stage.status(), JobStatus::Writing);

        let output = stage.run(&job()).await.unwrap();
        assert_eq!(output.draft_content.as_deref(), Some("About AI adoption"));
    }

    #[tokio::test]
    async fn test_async_fn_stage() {
        let stage = AsyncFnStage::new("polish", JobStatus::Editing, |job: ContentJob| async move {
            if job.draft_content.is_none() {
                return Err(StageError::permanent("nothing to edit"));
            }
            Ok(StageOutput::empty())
        });

        let err = stage.run(&job()).await.unwrap_err();
        assert_eq!(err, StageError::permanent("nothing to edit"));
    }

    #[test]
    fn test_stage_kind_status() {
        let statuses: Vec<JobStatus> = StageKind::STANDARD.iter().map(StageKind::status).collect();
        assert_eq!(
            statuses,
            vec![
                JobStatus::Researching,
                JobStatus::Planning,
                JobStatus::Writing,
                JobStatus::Editing
            ]
        );
    }

    #[test]
    fn test_stage_kind_parse_and_serialize() {
        assert_eq!("Writing".parse::<StageKind>().unwrap(), StageKind::Write);
        assert!("publish".parse::<StageKind>().is_err());
        assert_eq!(serde_json::to_string(&StageKind::Plan).unwrap(), r#""plan""#);
    }
}
