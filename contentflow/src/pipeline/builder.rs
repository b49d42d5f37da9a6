//! Pipeline builder with validation.

use super::sequencer::{ContentPipeline, PlannedStage};
use super::StageSpec;
use crate::core::JobStatus;
use crate::errors::PipelineValidationError;
use crate::events::{NoOpObserver, ProgressObserver};
use crate::retry::{Retrier, RetryPolicy};
use crate::stages::Stage;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on a single progress notification.
pub const DEFAULT_OBSERVER_TIMEOUT: Duration = Duration::from_millis(250);

/// Builder for creating validated pipelines.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<StageSpec>,
    default_retry: RetryPolicy,
    default_timeout: Option<Duration>,
    generation_timeout: Option<Duration>,
    observer: Option<Arc<dyn ProgressObserver>>,
    observer_timeout: Duration,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            default_retry: RetryPolicy::default(),
            default_timeout: None,
            generation_timeout: None,
            observer: None,
            observer_timeout: DEFAULT_OBSERVER_TIMEOUT,
        }
    }

    /// Appends a stage using the pipeline defaults.
    #[must_use]
    pub fn stage(self, stage: Arc<dyn Stage>) -> Self {
        self.stage_spec(StageSpec::new(stage))
    }

    /// Appends a stage with its own settings.
    #[must_use]
    pub fn stage_spec(mut self, spec: StageSpec) -> Self {
        self.stages.push(spec);
        self
    }

    /// Appends several stages using the pipeline defaults.
    #[must_use]
    pub fn stages(mut self, stages: impl IntoIterator<Item = Arc<dyn Stage>>) -> Self {
        self.stages.extend(stages.into_iter().map(StageSpec::new));
        self
    }

    /// Retry policy for stages without their own.
    #[must_use]
    pub fn default_retry(mut self, policy: RetryPolicy) -> Self {
        self.default_retry = policy;
        self
    }

    /// Attempt timeout for stages without their own.
    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Bound on the whole run, retries included.
    #[must_use]
    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = Some(timeout);
        self
    }

    /// Sets the progress observer.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Bound on each progress notification.
    #[must_use]
    pub fn observer_timeout(mut self, timeout: Duration) -> Self {
        self.observer_timeout = timeout;
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Fails when the stage list is empty, a name repeats, a stage carries a
    /// status that is not in-progress, the statuses go backwards, the first
    /// stage is not `researching`, or a retry policy is invalid.
    pub fn build(self) -> Result<ContentPipeline, PipelineValidationError> {
        self.validate()?;

        let default_retry = Arc::new(self.default_retry);
        let stages = self
            .stages
            .into_iter()
            .map(|spec| {
                let policy = spec.retry.map_or_else(|| default_retry.clone(), Arc::new);
                PlannedStage {
                    retrier: Retrier::new(policy).named(spec.stage.name().to_string()),
                    timeout: spec.timeout.or(self.default_timeout),
                    stage: spec.stage,
                }
            })
            .collect();

        Ok(ContentPipeline::new(
            self.name,
            stages,
            self.generation_timeout,
            self.observer.unwrap_or_else(|| Arc::new(NoOpObserver)),
            self.observer_timeout,
        ))
    }

    fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages"));
        }

        policy_error(&self.default_retry, "default")?;

        let mut seen = HashSet::new();
        let mut previous: Option<&StageSpec> = None;
        for spec in &self.stages {
            let name = spec.name();
            if !seen.insert(name) {
                return Err(PipelineValidationError::new(format!("Duplicate stage name '{name}'"))
                    .with_stages(vec![name.to_string()]));
            }

            let status = spec.stage.status();
            if !status.is_in_progress() {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{name}' declares status '{status}', which is not an in-progress status"
                ))
                .with_stages(vec![name.to_string()]));
            }

            match previous {
                None if status != JobStatus::Researching => {
                    return Err(PipelineValidationError::new(format!(
                        "First stage '{name}' must run as 'researching', not '{status}'"
                    ))
                    .with_stages(vec![name.to_string()]));
                }
                Some(prev) if !prev.stage.status().can_transition_to(status) => {
                    return Err(PipelineValidationError::new(format!(
                        "Stage '{name}' ('{status}') cannot follow '{}' ('{}')",
                        prev.name(),
                        prev.stage.status()
                    ))
                    .with_stages(vec![prev.name().to_string(), name.to_string()]));
                }
                _ => {}
            }

            if let Some(policy) = &spec.retry {
                policy_error(policy, name)?;
            }
            previous = Some(spec);
        }

        Ok(())
    }
}

fn policy_error(policy: &RetryPolicy, owner: &str) -> Result<(), PipelineValidationError> {
    policy.validate().map_err(|err| {
        PipelineValidationError::new(format!("Invalid retry policy for '{owner}': {err}"))
            .with_stages(vec![owner.to_string()])
    })
}
