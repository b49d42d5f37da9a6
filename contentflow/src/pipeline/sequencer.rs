//! The pipeline sequencer.

use crate::cancellation::CancellationToken;
use crate::core::{ContentJob, FailureKind, StageOutput};
use crate::errors::{ContentflowError, StageError};
use crate::events::{ProgressEvent, ProgressKind, ProgressObserver};
use crate::retry::stage::{into_stage_error, run_attempt};
use crate::retry::Retrier;
use crate::stages::Stage;
use crate::store::JobRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Smallest processing duration recorded on a finished job.
const MIN_PROCESSING_DURATION: Duration = Duration::from_micros(1);

/// A stage with its resolved retry controller and attempt timeout.
#[derive(Debug, Clone)]
pub(crate) struct PlannedStage {
    pub(crate) stage: Arc<dyn Stage>,
    pub(crate) retrier: Retrier,
    pub(crate) timeout: Option<Duration>,
}

/// Runs content jobs through an ordered list of stages.
///
/// Stages run strictly one after another. Before each one the job moves to
/// the stage's status and is saved; after it the stage's output is merged
/// and saved again, so the next stage and any reader of the repository see
/// it. The first failing stage ends the run with the job marked failed.
///
/// A pipeline holds no per-job state and can run many jobs concurrently.
#[derive(Debug, Clone)]
pub struct ContentPipeline {
    name: String,
    stages: Vec<PlannedStage>,
    generation_timeout: Option<Duration>,
    observer: Arc<dyn ProgressObserver>,
    observer_timeout: Duration,
}

impl ContentPipeline {
    pub(crate) fn new(
        name: String,
        stages: Vec<PlannedStage>,
        generation_timeout: Option<Duration>,
        observer: Arc<dyn ProgressObserver>,
        observer_timeout: Duration,
    ) -> Self {
        Self {
            name,
            stages,
            generation_timeout,
            observer,
            observer_timeout,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.stage.name()).collect()
    }

    /// Runs a pending job to a terminal state.
    ///
    /// Stage failures do not surface as errors: they end the run with the
    /// returned job in status `failed`. An `Err` means the job could not be
    /// run at all (it was not pending) or could not be saved.
    pub async fn run(
        &self,
        job: ContentJob,
        repository: &dyn JobRepository,
        cancel: &CancellationToken,
    ) -> Result<ContentJob, ContentflowError> {
        job.ensure_runnable()?;
        let span = info_span!("content_pipeline", pipeline = %self.name, job_id = %job.id);
        self.execute(job, repository, cancel).instrument(span).await
    }

    async fn execute(
        &self,
        mut job: ContentJob,
        repository: &dyn JobRepository,
        cancel: &CancellationToken,
    ) -> Result<ContentJob, ContentflowError> {
        let started = Instant::now();
        info!(
            stages = self.stages.len(),
            topic = %job.request.topic,
            content_type = %job.request.content_type,
            "Starting content generation"
        );

        for planned in &self.stages {
            let name = planned.stage.name();

            if cancel.is_cancelled() {
                let reason = cancel.reason().unwrap_or_else(|| "cancelled".to_string());
                warn!(next_stage = name, reason = %reason, "Job cancelled between stages");
                let message = format!("cancelled before stage '{name}': {reason}");
                return self
                    .finish_failed(job, FailureKind::Cancelled, message, None, started, repository)
                    .await;
            }

            job.transition_to(planned.stage.status())?;
            persist(&job, name, started, repository).await?;
            self.notify(
                ProgressEvent::new(
                    job.id,
                    ProgressKind::StageStarted,
                    job.status(),
                    format!("Running {name} stage"),
                )
                .with_stage(name),
            )
            .await;

            let stage_started = Instant::now();
            match self.run_stage(planned, &job, cancel, started).await {
                Ok(output) => {
                    let elapsed = stage_started.elapsed();
                    job.apply(output);
                    job.record_stage_timing(name, elapsed);
                    persist(&job, name, started, repository).await?;
                    info!(
                        stage = name,
                        duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                        "Stage completed"
                    );
                    self.notify(
                        ProgressEvent::new(
                            job.id,
                            ProgressKind::StageCompleted,
                            job.status(),
                            format!("Finished {name} stage"),
                        )
                        .with_stage(name),
                    )
                    .await;
                }
                Err(err) => {
                    error!(stage = name, error = %err, kind = %err.kind(), "Stage failed");
                    return self
                        .finish_failed(job, err.kind(), err.to_string(), Some(name), started, repository)
                        .await;
                }
            }
        }

        let has_content = job
            .generated_content
            .as_deref()
            .is_some_and(|content| !content.trim().is_empty());
        if !has_content {
            error!("Pipeline finished without generated content");
            return self
                .finish_failed(
                    job,
                    FailureKind::Permanent,
                    "no content was generated".to_string(),
                    None,
                    started,
                    repository,
                )
                .await;
        }

        job.complete(processing_duration(started))?;
        repository.save(&job).await?;
        info!(
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Content generation completed"
        );
        self.notify(ProgressEvent::new(
            job.id,
            ProgressKind::JobCompleted,
            job.status(),
            "Content generation completed",
        ))
        .await;

        Ok(job)
    }

    /// Runs one stage under its retry policy, bounded by what is left of
    /// the generation timeout.
    async fn run_stage(
        &self,
        planned: &PlannedStage,
        job: &ContentJob,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<StageOutput, StageError> {
        let stage = planned.stage.as_ref();
        let retrier = planned.retrier.clone().with_cancellation(cancel.clone());
        let attempts = retrier.run_if(
            || run_attempt(stage, job, planned.timeout),
            StageError::is_retryable,
        );

        let result = match self.generation_timeout {
            Some(limit) => {
                let remaining = limit.saturating_sub(started.elapsed());
                match tokio::time::timeout(remaining, attempts).await {
                    Ok(result) => result,
                    Err(_) => return Err(StageError::Timeout(limit)),
                }
            }
            None => attempts.await,
        };

        match result {
            Ok(outcome) => {
                if outcome.attempts > 1 {
                    debug!(stage = stage.name(), attempts = outcome.attempts, "Stage succeeded after retry");
                }
                Ok(outcome.value)
            }
            Err(err) if err.is_cancelled() => {
                let reason = cancel.reason().unwrap_or_else(|| "cancelled".to_string());
                Err(StageError::Cancelled(format!(
                    "{reason} (after {} attempts)",
                    err.attempts()
                )))
            }
            Err(err) => Err(into_stage_error(err)),
        }
    }

    async fn finish_failed(
        &self,
        mut job: ContentJob,
        kind: FailureKind,
        message: String,
        stage: Option<&str>,
        started: Instant,
        repository: &dyn JobRepository,
    ) -> Result<ContentJob, ContentflowError> {
        job.mark_failed(kind, message, stage, processing_duration(started))?;
        repository.save(&job).await?;

        let mut event = ProgressEvent::new(
            job.id,
            ProgressKind::JobFailed,
            job.status(),
            job.error_message().unwrap_or("failed").to_string(),
        );
        if let Some(stage) = stage {
            event = event.with_stage(stage);
        }
        self.notify(event).await;

        Ok(job)
    }

    /// Delivers one event, never waiting longer than the observer timeout.
    async fn notify(&self, event: ProgressEvent) {
        match tokio::time::timeout(self.observer_timeout, self.observer.on_progress(&event)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(kind = ?event.kind, stage = ?event.stage, error = %err, "Progress observer failed");
            }
            Err(_) => {
                warn!(
                    kind = ?event.kind,
                    stage = ?event.stage,
                    timeout_ms = u64::try_from(self.observer_timeout.as_millis()).unwrap_or(u64::MAX),
                    "Progress observer timed out"
                );
            }
        }
    }
}

/// Saves the job mid-run.
///
/// When the save fails, a failed copy of the job is saved in its place on a
/// best-effort basis so the stored record does not stay in progress.
async fn persist(
    job: &ContentJob,
    stage: &str,
    started: Instant,
    repository: &dyn JobRepository,
) -> Result<(), ContentflowError> {
    let Err(err) = repository.save(job).await else {
        return Ok(());
    };
    error!(stage, status = %job.status(), error = %err, "Failed to persist job");

    let mut failed = job.clone();
    let message = format!("failed to persist job state: {err}");
    if failed
        .mark_failed(FailureKind::Transient, message, Some(stage), processing_duration(started))
        .is_ok()
    {
        if let Err(retry_err) = repository.save(&failed).await {
            warn!(stage, error = %retry_err, "Could not record the persistence failure");
        }
    }
    Err(err.into())
}

fn processing_duration(started: Instant) -> Duration {
    started.elapsed().max(MIN_PROCESSING_DURATION)
}
