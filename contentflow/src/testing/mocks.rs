//! Mock stages, repositories and observers for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::{ContentJob, JobId, JobStatus, StageOutput};
use crate::errors::{StageError, StoreError};
use crate::events::{ProgressEvent, ProgressObserver};
use crate::stages::Stage;
use crate::store::{InMemoryJobRepository, JobQuery, JobRepository};

/// A stage that plays back a script of results and counts its calls.
///
/// Scripted results are consumed first, one per call; afterwards every
/// call returns the configured output.
#[derive(Debug)]
pub struct ScriptedStage {
    name: String,
    status: JobStatus,
    output: StageOutput,
    script: Mutex<VecDeque<Result<StageOutput, StageError>>>,
    latency: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<ContentJob>>,
}

impl ScriptedStage {
    /// Creates a stage that succeeds with an empty output.
    #[must_use]
    pub fn new(name: impl Into<String>, status: JobStatus) -> Self {
        Self {
            name: name.into(),
            status,
            output: StageOutput::empty(),
            script: Mutex::new(VecDeque::new()),
            latency: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Sets the output returned once the script is used up.
    #[must_use]
    pub fn with_output(mut self, output: StageOutput) -> Self {
        self.output = output;
        self
    }

    /// Makes the next `times` calls fail with `error`.
    #[must_use]
    pub fn fail_times(self, times: usize, error: StageError) -> Self {
        self.script
            .lock()
            .extend(std::iter::repeat(Err(error)).take(times));
        self
    }

    /// Appends one scripted result.
    #[must_use]
    pub fn then(self, result: Result<StageOutput, StageError>) -> Self {
        self.script.lock().push_back(result);
        self
    }

    /// Sleeps this long on every call before answering.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of times the stage was run.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Job snapshots the stage was handed, one per call.
    #[must_use]
    pub fn seen_jobs(&self) -> Vec<ContentJob> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Stage for ScriptedStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    async fn run(&self, job: &ContentJob) -> Result<StageOutput, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(job.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(self.output.clone()))
    }
}

/// A stage that cancels a token while it runs, then succeeds.
///
/// Used to check that cancellation is honoured at the next stage boundary.
#[derive(Debug)]
pub struct CancellingStage {
    inner: ScriptedStage,
    token: crate::cancellation::CancellationToken,
}

impl CancellingStage {
    /// Wraps `inner`, cancelling `token` on each call.
    #[must_use]
    pub fn new(inner: ScriptedStage, token: crate::cancellation::CancellationToken) -> Self {
        Self { inner, token }
    }

    /// Number of times the stage was run.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.inner.calls()
    }
}

#[async_trait]
impl Stage for CancellingStage {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn status(&self) -> JobStatus {
        self.inner.status()
    }

    async fn run(&self, job: &ContentJob) -> Result<StageOutput, StageError> {
        let result = self.inner.run(job).await;
        self.token.cancel("user request");
        result
    }
}

/// A repository that keeps every saved snapshot in order.
#[derive(Debug, Default)]
pub struct RecordingRepository {
    inner: InMemoryJobRepository,
    history: Mutex<Vec<ContentJob>>,
    fail_after: Mutex<Option<usize>>,
    fail_on: Mutex<Option<usize>>,
    attempts: AtomicUsize,
}

impl RecordingRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every save after the first `saves` succeeded.
    #[must_use]
    pub fn failing_after(saves: usize) -> Self {
        let repo = Self::default();
        *repo.fail_after.lock() = Some(saves);
        repo
    }

    /// Fails only the `attempt`-th save, counting from one.
    #[must_use]
    pub fn failing_save(attempt: usize) -> Self {
        let repo = Self::default();
        *repo.fail_on.lock() = Some(attempt);
        repo
    }

    /// Every snapshot saved so far.
    #[must_use]
    pub fn history(&self) -> Vec<ContentJob> {
        self.history.lock().clone()
    }

    /// Statuses of the saved snapshots, in order.
    #[must_use]
    pub fn saved_statuses(&self) -> Vec<JobStatus> {
        self.history.lock().iter().map(ContentJob::status).collect()
    }
}

#[async_trait]
impl JobRepository for RecordingRepository {
    async fn save(&self, job: &ContentJob) -> Result<(), StoreError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_on.lock() == Some(attempt) {
            return Err(StoreError::Backend("database unavailable".to_string()));
        }
        {
            let mut history = self.history.lock();
            if let Some(limit) = *self.fail_after.lock() {
                if history.len() >= limit {
                    return Err(StoreError::Backend("database unavailable".to_string()));
                }
            }
            history.push(job.clone());
        }
        self.inner.save(job).await
    }

    async fn load(&self, id: JobId) -> Result<ContentJob, StoreError> {
        self.inner.load(id).await
    }

    async fn delete(&self, id: JobId) -> Result<bool, StoreError> {
        self.inner.delete(id).await
    }

    async fn list(&self, query: &JobQuery) -> Result<Vec<ContentJob>, StoreError> {
        self.inner.list(query).await
    }

    async fn count(&self, status: Option<JobStatus>) -> Result<usize, StoreError> {
        self.inner.count(status).await
    }
}

/// An observer that is slow, fails, or both.
#[derive(Debug, Default)]
pub struct FaultyObserver {
    delay: Option<Duration>,
    fail: bool,
    calls: AtomicUsize,
}

impl FaultyObserver {
    /// An observer that never answers within `delay`.
    #[must_use]
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// An observer that always errors.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Number of notifications received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressObserver for FaultyObserver {
    async fn on_progress(&self, _event: &ProgressEvent) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            anyhow::bail!("observer unavailable");
        }
        Ok(())
    }
}
