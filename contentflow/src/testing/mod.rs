//! Testing utilities for content pipelines.
//!
//! This module provides:
//! - Scripted mock stages with call counters
//! - A repository that records every saved snapshot
//! - Slow and failing observers
//! - Sample requests and stage sets

mod fixtures;
mod mocks;

pub use fixtures::{
    as_stages, sample_outline, sample_request, sample_research, standard_stages,
};
pub use mocks::{CancellingStage, FaultyObserver, RecordingRepository, ScriptedStage};
