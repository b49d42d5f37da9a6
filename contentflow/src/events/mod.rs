//! Progress reporting.
//!
//! The sequencer reports every stage transition as a [`ProgressEvent`] to a
//! [`ProgressObserver`]. Observers are best-effort: the sequencer bounds each
//! notification with a short timeout and only logs failures.

mod broadcast;
mod observer;

pub use broadcast::{BroadcastObserver, JobSubscription};
pub use observer::{
    CollectingObserver, FanoutObserver, LoggingObserver, NoOpObserver, ProgressObserver,
};

use crate::core::{JobId, JobStatus};
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};

/// What a progress event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    /// A stage is about to run.
    StageStarted,
    /// A stage finished and its output was persisted.
    StageCompleted,
    /// The job completed.
    JobCompleted,
    /// The job failed or was cancelled.
    JobFailed,
}

impl ProgressKind {
    /// Returns true for the two job-level kinds.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::JobCompleted | Self::JobFailed)
    }
}

/// One progress notification, serialised as JSON for websocket clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The job.
    pub job_id: JobId,
    /// What happened.
    pub kind: ProgressKind,
    /// Stage involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Job status after the transition.
    pub status: JobStatus,
    /// Completion percentage derived from the status.
    pub progress: u8,
    /// Human-readable description.
    pub message: String,
    /// When the transition happened.
    pub timestamp: Timestamp,
}

impl ProgressEvent {
    /// Creates an event; progress is derived from `status`.
    #[must_use]
    pub fn new(job_id: JobId, kind: ProgressKind, status: JobStatus, message: impl Into<String>) -> Self {
        Self {
            job_id,
            kind,
            stage: None,
            status,
            progress: status.progress_percent(),
            message: message.into(),
            timestamp: now_utc(),
        }
    }

    /// Sets the stage name.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_progress_follows_status() {
        let event = ProgressEvent::new(
            JobId::new(),
            ProgressKind::StageStarted,
            JobStatus::Writing,
            "Writing draft",
        )
        .with_stage("write");

        assert_eq!(event.progress, 75);
        assert_eq!(event.stage.as_deref(), Some("write"));
    }

    #[test]
    fn test_event_json_shape() {
        let event = ProgressEvent::new(
            JobId::new(),
            ProgressKind::JobCompleted,
            JobStatus::Completed,
            "done",
        );
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["kind"], "job_completed");
        assert_eq!(value["status"], "completed");
        assert_eq!(value["progress"], 100);
        assert!(value.get("stage").is_none());
        assert!(ProgressKind::JobFailed.is_terminal());
        assert!(!ProgressKind::StageCompleted.is_terminal());
    }
}
