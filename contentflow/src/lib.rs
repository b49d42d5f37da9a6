//! # Contentflow
//!
//! A retrying, multi-stage content generation pipeline.
//!
//! A content job moves through research, planning, writing and editing.
//! Each stage is an LLM-backed agent that may fail transiently, so every
//! stage runs under a bounded exponential-backoff retry controller:
//!
//! - **Retry controller**: attempt budgets, capped exponential backoff with
//!   jitter, cancellation of pending attempts and delays
//! - **Pipeline sequencer**: strict stage order, persistence after every
//!   transition, progress notifications, per-attempt and whole-run timeouts
//! - **Job service**: validated submission, background execution, status,
//!   progress and cancellation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use contentflow::prelude::*;
//!
//! let settings = Settings::from_env()?;
//! let client: Arc<dyn LlmClient> = Arc::new(settings.llm.anthropic_client()?);
//!
//! let pipeline = settings.content_pipeline(&client)?;
//! let repository = InMemoryJobRepository::new();
//!
//! let job = ContentJob::new(ContentRequest::new("AI adoption in 2025"));
//! let job = pipeline.run(job, &repository, &CancellationToken::new()).await?;
//! println!("{}", job.generated_content.unwrap_or_default());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod agents;
pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod retry;
pub mod service;
pub mod stages;
pub mod store;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::agents::{default_stages, stages_for, AgentConfig, LlmClient};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::Settings;
    pub use crate::core::{
        ContentJob, ContentRequest, ContentType, FailureKind, JobId, JobStatus, StageOutput,
        Tone,
    };
    pub use crate::errors::{ContentflowError, RetryError, StageError};
    pub use crate::events::{ProgressEvent, ProgressKind, ProgressObserver};
    pub use crate::pipeline::{ContentPipeline, PipelineBuilder, StageSpec};
    pub use crate::retry::{Retrier, RetryPolicy};
    pub use crate::service::JobService;
    pub use crate::stages::{Stage, StageKind};
    pub use crate::store::{InMemoryJobRepository, JobCache, JobQuery, JobRepository};
    pub use crate::utils::{generate_uuid, iso_timestamp, Timestamp};
}
