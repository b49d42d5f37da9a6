//! Tests for the job record and its state machine.

use super::*;
use pretty_assertions::assert_eq;
use std::time::Duration;

fn job() -> ContentJob {
    ContentJob::new(ContentRequest::new("AI adoption"))
}

#[test]
fn test_new_job_is_pending() {
    let job = job();
    assert_eq!(job.status(), JobStatus::Pending);
    assert!(job.completed_at().is_none());
    assert!(job.error_message().is_none());
    assert!(job.ensure_runnable().is_ok());
}

#[test]
fn test_transition_follows_pipeline_order() {
    let mut job = job();
    job.transition_to(JobStatus::Researching).unwrap();
    job.transition_to(JobStatus::Planning).unwrap();

    let err = job.transition_to(JobStatus::Researching).unwrap_err();
    assert_eq!(err.status, JobStatus::Planning);
    assert_eq!(job.status(), JobStatus::Planning);
}

#[test]
fn test_transition_rejects_terminal_targets() {
    let mut job = job();
    job.transition_to(JobStatus::Researching).unwrap();
    assert!(job.transition_to(JobStatus::Completed).is_err());
    assert!(job.transition_to(JobStatus::Failed).is_err());
}

#[test]
fn test_complete_sets_completed_at() {
    let mut job = job();
    job.transition_to(JobStatus::Researching).unwrap();
    job.complete(Duration::from_millis(5)).unwrap();

    assert_eq!(job.status(), JobStatus::Completed);
    assert!(job.completed_at().is_some());
    assert_eq!(job.processing_duration(), Some(Duration::from_millis(5)));
    assert!(job.error_message().is_none());
}

#[test]
fn test_complete_from_pending_rejected() {
    let mut job = job();
    assert!(job.complete(Duration::ZERO).is_err());
    assert!(job.completed_at().is_none());
}

#[test]
fn test_mark_failed_records_error() {
    let mut job = job();
    job.transition_to(JobStatus::Researching).unwrap();
    job.mark_failed(
        FailureKind::Permanent,
        "content policy",
        Some("research"),
        Duration::from_millis(1),
    )
    .unwrap();

    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.error_message(), Some("content policy"));
    assert_eq!(job.error_kind(), Some(FailureKind::Permanent));
    assert_eq!(job.failed_stage(), Some("research"));
    assert!(job.completed_at().is_some());
    assert!(job.ensure_runnable().is_err());
}

#[test]
fn test_failed_job_cannot_complete() {
    let mut job = job();
    job.mark_failed(FailureKind::Cancelled, "cancelled", None, Duration::ZERO)
        .unwrap();
    assert!(job.complete(Duration::ZERO).is_err());
    assert!(job
        .mark_failed(FailureKind::Transient, "again", None, Duration::ZERO)
        .is_err());
    assert_eq!(job.error_kind(), Some(FailureKind::Cancelled));
}

#[test]
fn test_apply_merges_only_set_fields() {
    let mut job = job();
    let notes = ResearchNotes {
        key_facts: vec!["fact".to_string()],
        ..ResearchNotes::default()
    };
    job.apply(StageOutput::research(notes.clone()));
    job.apply(StageOutput::outline(ContentOutline::new("Title")));

    assert_eq!(job.research_notes, Some(notes));
    assert_eq!(job.outline.as_ref().map(|o| o.title.as_str()), Some("Title"));
    assert!(job.draft_content.is_none());
}

#[test]
fn test_job_roundtrips_through_json() {
    let mut job = job();
    job.transition_to(JobStatus::Researching).unwrap();
    job.apply(StageOutput::draft("draft"));
    job.record_stage_timing("research", Duration::from_millis(12));
    job.complete(Duration::from_millis(1500)).unwrap();

    let json = serde_json::to_string(&job).unwrap();
    let restored: ContentJob = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, job);
    assert_eq!(restored.processing_duration(), Some(Duration::from_millis(1500)));
}

#[test]
fn test_job_id_parse() {
    let id = JobId::new();
    let parsed: JobId = id.to_string().parse().unwrap();
    assert_eq!(parsed, id);
    assert!("not-a-uuid".parse::<JobId>().is_err());
}
