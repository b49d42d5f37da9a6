//! Core domain model types for contentflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Job status, failure kind and content enums
//! - The content request and the job record with its state machine
//! - Stage output and the documents stages produce

mod job;
#[cfg(test)]
mod job_tests;
mod output;
mod request;
mod status;

pub use job::{ContentJob, JobId};
pub use output::{ContentOutline, OutlineSection, ResearchNotes, StageOutput};
pub use request::{
    ContentRequest, MAX_TOPIC_LEN, MAX_WORD_COUNT, MIN_TOPIC_LEN, MIN_WORD_COUNT,
};
pub use status::{ContentType, FailureKind, JobStatus, Tone};
