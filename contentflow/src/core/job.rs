//! The content job record and its state machine.

use super::{ContentOutline, ContentRequest, FailureKind, JobStatus, ResearchNotes, StageOutput};
use crate::errors::InvalidStateError;
use crate::utils::{durations, now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Unique, immutable identifier of a content job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(crate::utils::generate_uuid())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// One content-generation request and its accumulated state.
///
/// Status only moves through [`ContentJob::transition_to`],
/// [`ContentJob::complete`] and [`ContentJob::mark_failed`], which keep the
/// record consistent: `completed_at` is set exactly when the job is terminal
/// and `error_message` exactly when it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentJob {
    /// Job identifier.
    pub id: JobId,
    /// What was requested.
    pub request: ContentRequest,
    status: JobStatus,
    /// Research findings, once the research stage ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_notes: Option<ResearchNotes>,
    /// Outline, once the planning stage ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<ContentOutline>,
    /// First draft, once the writing stage ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_content: Option<String>,
    /// Final content, once the editing stage ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_content: Option<String>,
    error_message: Option<String>,
    error_kind: Option<FailureKind>,
    failed_stage: Option<String>,
    #[serde(default, with = "durations::option_secs_f64")]
    processing_duration: Option<Duration>,
    /// Milliseconds spent in each stage that finished.
    #[serde(default)]
    pub stage_timings: BTreeMap<String, f64>,
    /// When the job was submitted.
    pub created_at: Timestamp,
    /// When the record last changed.
    pub updated_at: Timestamp,
    completed_at: Option<Timestamp>,
}

impl ContentJob {
    /// Creates a pending job with a fresh identifier.
    #[must_use]
    pub fn new(request: ContentRequest) -> Self {
        Self::with_id(JobId::new(), request)
    }

    /// Creates a pending job with the given identifier.
    #[must_use]
    pub fn with_id(id: JobId, request: ContentRequest) -> Self {
        let now = now_utc();
        Self {
            id,
            request,
            status: JobStatus::Pending,
            research_notes: None,
            outline: None,
            draft_content: None,
            generated_content: None,
            error_message: None,
            error_kind: None,
            failed_stage: None,
            processing_duration: None,
            stage_timings: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Error message, set only when the job failed.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Failure classification, set only when the job failed.
    #[must_use]
    pub fn error_kind(&self) -> Option<FailureKind> {
        self.error_kind
    }

    /// Name of the stage that failed, if a stage failed.
    #[must_use]
    pub fn failed_stage(&self) -> Option<&str> {
        self.failed_stage.as_deref()
    }

    /// Wall-clock time from start to terminal state.
    #[must_use]
    pub fn processing_duration(&self) -> Option<Duration> {
        self.processing_duration
    }

    /// When the job reached a terminal state.
    #[must_use]
    pub fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    /// Returns true once the job is completed or failed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Fails unless the job may be handed to the sequencer.
    pub fn ensure_runnable(&self) -> Result<(), InvalidStateError> {
        if self.status == JobStatus::Pending {
            Ok(())
        } else {
            Err(InvalidStateError::new(
                self.id,
                self.status,
                "only pending jobs can be run",
            ))
        }
    }

    /// Moves to an in-progress status.
    pub fn transition_to(&mut self, next: JobStatus) -> Result<(), InvalidStateError> {
        if next.is_terminal() {
            return Err(InvalidStateError::new(
                self.id,
                self.status,
                format!("use complete() or mark_failed() to reach '{next}'"),
            ));
        }
        self.check_transition(next)?;
        self.status = next;
        self.updated_at = now_utc();
        Ok(())
    }

    /// Marks the job completed.
    pub fn complete(&mut self, duration: Duration) -> Result<(), InvalidStateError> {
        self.check_transition(JobStatus::Completed)?;
        let now = now_utc();
        self.status = JobStatus::Completed;
        self.processing_duration = Some(duration);
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Marks the job failed, recording the error and the failing stage.
    pub fn mark_failed(
        &mut self,
        kind: FailureKind,
        message: impl Into<String>,
        stage: Option<&str>,
        duration: Duration,
    ) -> Result<(), InvalidStateError> {
        self.check_transition(JobStatus::Failed)?;
        let now = now_utc();
        self.status = JobStatus::Failed;
        self.error_message = Some(message.into());
        self.error_kind = Some(kind);
        self.failed_stage = stage.map(ToString::to_string);
        self.processing_duration = Some(duration);
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Merges the fields a stage produced.
    pub fn apply(&mut self, output: StageOutput) {
        let StageOutput {
            research_notes,
            outline,
            draft_content,
            generated_content,
        } = output;

        if research_notes.is_some() {
            self.research_notes = research_notes;
        }
        if outline.is_some() {
            self.outline = outline;
        }
        if draft_content.is_some() {
            self.draft_content = draft_content;
        }
        if generated_content.is_some() {
            self.generated_content = generated_content;
        }
        self.updated_at = now_utc();
    }

    /// Records how long a stage took.
    pub fn record_stage_timing(&mut self, stage: &str, elapsed: Duration) {
        self.stage_timings
            .insert(stage.to_string(), elapsed.as_secs_f64() * 1000.0);
    }

    fn check_transition(&self, next: JobStatus) -> Result<(), InvalidStateError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(InvalidStateError::new(
                self.id,
                self.status,
                format!("cannot move from '{}' to '{next}'", self.status),
            ))
        }
    }
}
