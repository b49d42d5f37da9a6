//! Pipeline building and execution.
//!
//! This module provides:
//! - Per-stage specifications (retry policy, attempt timeout)
//! - The pipeline builder with validation
//! - The sequencer that runs a job through its stages

mod builder;
mod sequencer;
mod spec;

pub use builder::{PipelineBuilder, DEFAULT_OBSERVER_TIMEOUT};
pub use sequencer::ContentPipeline;
pub use spec::StageSpec;
