//! Job submission and tracking.
//!
//! [`JobService`] is the entry point an API layer talks to: it validates and
//! persists new jobs, runs them on the tokio runtime, and answers status,
//! progress and cancellation requests while they run.

use crate::cancellation::CancellationToken;
use crate::config::Settings;
use crate::core::{ContentJob, ContentRequest, JobId};
use crate::errors::{ContentflowError, InvalidStateError};
use crate::events::ProgressEvent;
use crate::pipeline::ContentPipeline;
use crate::store::{JobCache, JobQuery, JobRepository, RateLimiter};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const USER_CANCEL_REASON: &str = "cancelled by user";

type FinishedSender = watch::Sender<Option<ContentJob>>;

/// A run slot. It has no handle while the job is still being loaded.
#[derive(Debug)]
struct RunningJob {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
    finished: watch::Receiver<Option<ContentJob>>,
}

impl RunningJob {
    fn is_active(&self) -> bool {
        self.handle.as_ref().map_or(true, |handle| !handle.is_finished())
    }
}

/// Submits content jobs and tracks them while they run.
#[derive(Debug)]
pub struct JobService {
    pipeline: Arc<ContentPipeline>,
    repository: Arc<dyn JobRepository>,
    cache: Arc<JobCache>,
    limiter: RateLimiter,
    running: DashMap<JobId, RunningJob>,
}

impl JobService {
    /// Creates a service.
    ///
    /// The pipeline should notify a [`crate::store::CacheProgressObserver`]
    /// over the same cache for [`JobService::get_progress`] to see updates.
    #[must_use]
    pub fn new(
        pipeline: ContentPipeline,
        repository: Arc<dyn JobRepository>,
        cache: Arc<JobCache>,
        settings: &Settings,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            repository,
            cache,
            limiter: settings.rate_limit.limiter(),
            running: DashMap::new(),
        }
    }

    /// The pipeline jobs run through.
    #[must_use]
    pub fn pipeline(&self) -> &ContentPipeline {
        &self.pipeline
    }

    /// Validates and persists a new job, then starts it in the background.
    pub async fn submit(&self, request: ContentRequest) -> Result<JobId, ContentflowError> {
        request.validate()?;
        let job = ContentJob::new(request);
        let id = job.id;
        self.repository.save(&job).await?;
        self.cache.put_job(&job);
        info!(job_id = %id, topic = %job.request.topic, "Job submitted");
        if let Some((token, sender)) = self.reserve(id) {
            self.launch(job, token, sender);
        }
        Ok(id)
    }

    /// Like [`JobService::submit`], counted against `client`'s quota.
    pub async fn submit_as(
        &self,
        client: &str,
        request: ContentRequest,
    ) -> Result<JobId, ContentflowError> {
        if let Err(retry_after) = self.limiter.check(client) {
            warn!(client, ?retry_after, "Submission rate limited");
            return Err(ContentflowError::RateLimited {
                client: client.to_string(),
                retry_after,
            });
        }
        self.submit(request).await
    }

    /// Current state of a job.
    ///
    /// Terminal snapshots are served from the cache; anything else is read
    /// from the repository.
    pub async fn get_status(&self, id: JobId) -> Result<ContentJob, ContentflowError> {
        if let Some(job) = self.cache.job(id).filter(ContentJob::is_terminal) {
            return Ok(job);
        }
        let job = self.repository.load(id).await?;
        if job.is_terminal() {
            self.cache.put_job(&job);
        }
        Ok(job)
    }

    /// Latest progress event for a job, while it is cached.
    #[must_use]
    pub fn get_progress(&self, id: JobId) -> Option<ProgressEvent> {
        self.cache.progress(id)
    }

    /// Returns true while the job's run is in flight.
    #[must_use]
    pub fn is_running(&self, id: JobId) -> bool {
        self.running.get(&id).is_some_and(|run| run.is_active())
    }

    /// Number of runs in flight.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.running.iter().filter(|run| run.is_active()).count()
    }

    /// Asks a running job to stop.
    ///
    /// The job ends in `failed` with kind `cancelled`; an in-flight stage
    /// attempt is abandoned.
    pub async fn cancel(&self, id: JobId) -> Result<(), ContentflowError> {
        if let Some(run) = self.running.get(&id).filter(|run| run.is_active()) {
            run.token.cancel(USER_CANCEL_REASON);
            info!(job_id = %id, "Cancellation requested");
            return Ok(());
        }
        let job = self.repository.load(id).await?;
        Err(InvalidStateError::new(id, job.status(), "job is not running").into())
    }

    /// Starts a stored pending job that is not running, e.g. after a restart.
    ///
    /// The run slot is claimed before the job is loaded, so concurrent
    /// resumes of one job start at most one run.
    pub async fn resume(&self, id: JobId) -> Result<(), ContentflowError> {
        let Some((token, sender)) = self.reserve(id) else {
            let status = self.repository.load(id).await?.status();
            return Err(InvalidStateError::new(id, status, "job is already running").into());
        };

        let loaded = match self.repository.load(id).await {
            Ok(job) => job.ensure_runnable().map(|()| job).map_err(ContentflowError::from),
            Err(err) => Err(err.into()),
        };
        match loaded {
            Ok(job) => {
                info!(job_id = %id, "Job resumed");
                self.launch(job, token, sender);
                Ok(())
            }
            Err(err) => {
                self.running.remove(&id);
                Err(err)
            }
        }
    }

    /// Waits for a job's run to finish and returns the final job.
    ///
    /// A job that is not running is returned as currently stored.
    pub async fn wait(&self, id: JobId) -> Result<ContentJob, ContentflowError> {
        let receiver = self.running.get(&id).map(|run| run.finished.clone());
        if let Some(mut receiver) = receiver {
            let finished = receiver
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|job| job.clone());
            if let Some(job) = finished {
                return Ok(job);
            }
        }
        Ok(self.repository.load(id).await?)
    }

    /// Lists stored jobs.
    pub async fn list(&self, query: &JobQuery) -> Result<Vec<ContentJob>, ContentflowError> {
        Ok(self.repository.list(query).await?)
    }

    /// Deletes a job that is not running. Returns false if it did not exist.
    pub async fn delete(&self, id: JobId) -> Result<bool, ContentflowError> {
        if self.is_running(id) {
            let status = self.repository.load(id).await?.status();
            return Err(InvalidStateError::new(id, status, "cannot delete a running job").into());
        }
        self.running.remove(&id);
        self.cache.invalidate(id);
        Ok(self.repository.delete(id).await?)
    }

    /// Cancels every running job and waits for the runs to end.
    pub async fn shutdown(&self, reason: &str) {
        let ids: Vec<JobId> = self.running.iter().map(|run| *run.key()).collect();
        let runs: Vec<RunningJob> = ids
            .into_iter()
            .filter_map(|id| self.running.remove(&id).map(|(_, run)| run))
            .collect();
        for run in &runs {
            run.token.cancel(reason);
        }
        info!(jobs = runs.len(), reason, "Shutting down job service");
        for handle in runs.into_iter().filter_map(|run| run.handle) {
            if let Err(err) = handle.await {
                error!(error = %err, "Job task did not finish cleanly");
            }
        }
    }

    /// Claims the run slot for `id`. Returns `None` when a run holds it.
    fn reserve(&self, id: JobId) -> Option<(CancellationToken, FinishedSender)> {
        self.running.retain(|_, run| run.is_active());

        match self.running.entry(id) {
            Entry::Occupied(entry) if entry.get().is_active() => None,
            entry => {
                let token = CancellationToken::new();
                let (sender, finished) = watch::channel(None);
                entry.insert(RunningJob {
                    token: token.clone(),
                    handle: None,
                    finished,
                });
                Some((token, sender))
            }
        }
    }

    /// Spawns the run for a job whose slot is reserved.
    fn launch(&self, job: ContentJob, token: CancellationToken, sender: FinishedSender) {
        let id = job.id;
        let pipeline = Arc::clone(&self.pipeline);
        let repository = Arc::clone(&self.repository);
        let cache = Arc::clone(&self.cache);

        let handle = tokio::spawn(async move {
            match pipeline.run(job, repository.as_ref(), &token).await {
                Ok(job) => {
                    cache.put_job(&job);
                    let _ = sender.send(Some(job));
                }
                Err(err) => {
                    error!(job_id = %id, error = %err, "Job run aborted");
                    cache.invalidate(id);
                }
            }
        });

        if let Some(mut run) = self.running.get_mut(&id) {
            run.handle = Some(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FailureKind, JobStatus};
    use crate::errors::StageError;
    use crate::events::ProgressKind;
    use crate::pipeline::PipelineBuilder;
    use crate::retry::RetryPolicy;
    use crate::store::{CacheProgressObserver, InMemoryJobRepository};
    use crate::testing::{as_stages, sample_request, standard_stages, ScriptedStage};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn service_with(stages: &[Arc<ScriptedStage>], settings: &Settings) -> JobService {
        let cache = Arc::new(JobCache::default());
        let pipeline = PipelineBuilder::new("content")
            .stages(as_stages(stages))
            .default_retry(RetryPolicy::no_retry())
            .observer(Arc::new(CacheProgressObserver::new(Arc::clone(&cache))))
            .build()
            .unwrap();
        JobService::new(
            pipeline,
            Arc::new(InMemoryJobRepository::new()),
            cache,
            settings,
        )
    }

    fn service() -> JobService {
        service_with(&standard_stages(), &Settings::default())
    }

    fn slow_stages() -> [Arc<ScriptedStage>; 1] {
        [Arc::new(
            ScriptedStage::new("research", JobStatus::Researching)
                .with_latency(Duration::from_secs(60)),
        )]
    }

    #[tokio::test]
    async fn test_submit_and_wait() {
        let service = service();
        let id = service.submit(sample_request()).await.unwrap();

        let job = service.wait(id).await.unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert!(job.generated_content.is_some());

        let status = service.get_status(id).await.unwrap();
        assert_eq!(status.status(), JobStatus::Completed);

        let progress = service.get_progress(id).unwrap();
        assert_eq!(progress.kind, ProgressKind::JobCompleted);
        assert_eq!(progress.progress, 100);
        assert!(!service.is_running(id));
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_request() {
        let service = service();
        let err = service
            .submit(ContentRequest::new("AI").with_word_count(500))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentflowError::Validation(ref e) if e.field == "topic"));
        assert!(service.list(&JobQuery::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_as_is_rate_limited() {
        let mut settings = Settings::default();
        settings.rate_limit.max_requests = 2;
        let service = service_with(&standard_stages(), &settings);

        service.submit_as("client-a", sample_request()).await.unwrap();
        service.submit_as("client-a", sample_request()).await.unwrap();
        let err = service.submit_as("client-a", sample_request()).await.unwrap_err();
        assert!(matches!(err, ContentflowError::RateLimited { ref client, .. } if client == "client-a"));

        service.submit_as("client-b", sample_request()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_running_job() {
        let service = service_with(&slow_stages(), &Settings::default());
        let id = service.submit(sample_request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(service.is_running(id));

        service.cancel(id).await.unwrap();
        let job = service.wait(id).await.unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.error_kind(), Some(FailureKind::Cancelled));
        assert!(job.error_message().unwrap().contains(USER_CANCEL_REASON));
    }

    #[tokio::test]
    async fn test_cancel_finished_job_is_rejected() {
        let service = service();
        let id = service.submit(sample_request()).await.unwrap();
        service.wait(id).await.unwrap();

        let err = service.cancel(id).await.unwrap_err();
        assert!(matches!(err, ContentflowError::InvalidState(ref e) if e.status == JobStatus::Completed));
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let service = service();
        assert!(service.get_status(JobId::new()).await.unwrap_err().is_not_found());
        assert!(service.cancel(JobId::new()).await.unwrap_err().is_not_found());
        assert!(service.get_progress(JobId::new()).is_none());
    }

    #[tokio::test]
    async fn test_resume_pending_job() {
        let repository = Arc::new(InMemoryJobRepository::new());
        let pending = ContentJob::new(sample_request());
        repository.save(&pending).await.unwrap();

        let pipeline = PipelineBuilder::new("content")
            .stages(as_stages(&standard_stages()))
            .build()
            .unwrap();
        let service = JobService::new(
            pipeline,
            repository,
            Arc::new(JobCache::default()),
            &Settings::default(),
        );

        service.resume(pending.id).await.unwrap();
        let job = service.wait(pending.id).await.unwrap();
        assert_eq!(job.status(), JobStatus::Completed);

        let err = service.resume(pending.id).await.unwrap_err();
        assert!(matches!(err, ContentflowError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_concurrent_resumes_start_one_run() {
        let repository = Arc::new(InMemoryJobRepository::new());
        let pending = ContentJob::new(sample_request());
        repository.save(&pending).await.unwrap();

        let stages = standard_stages();
        let pipeline = PipelineBuilder::new("content")
            .stages(as_stages(&stages))
            .build()
            .unwrap();
        let service = JobService::new(
            pipeline,
            repository,
            Arc::new(JobCache::default()),
            &Settings::default(),
        );

        let (first, second) = tokio::join!(service.resume(pending.id), service.resume(pending.id));
        assert_eq!(usize::from(first.is_ok()) + usize::from(second.is_ok()), 1);
        let rejected = if first.is_ok() { second } else { first };
        assert!(matches!(rejected, Err(ContentflowError::InvalidState(_))));

        let job = service.wait(pending.id).await.unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert!(stages.iter().all(|s| s.calls() == 1));
    }

    #[tokio::test]
    async fn test_failed_resume_releases_the_slot() {
        let service = service();
        let missing = JobId::new();

        assert!(service.resume(missing).await.unwrap_err().is_not_found());
        assert!(!service.is_running(missing));
        assert_eq!(service.running_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_job_cannot_be_resumed_or_deleted() {
        let service = service_with(&slow_stages(), &Settings::default());
        let id = service.submit(sample_request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(matches!(service.resume(id).await, Err(ContentflowError::InvalidState(_))));
        assert!(matches!(service.delete(id).await, Err(ContentflowError::InvalidState(_))));
        service.shutdown("test over").await;
        assert_eq!(service.running_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_stage_is_reported() {
        let stages = standard_stages();
        let failing = [
            Arc::clone(&stages[0]),
            Arc::new(
                ScriptedStage::new("plan", JobStatus::Planning)
                    .fail_times(1, StageError::permanent("content policy")),
            ),
        ];
        let service = service_with(&failing, &Settings::default());
        let id = service.submit(sample_request()).await.unwrap();

        let job = service.wait(id).await.unwrap();
        assert_eq!(job.failed_stage(), Some("plan"));
        assert_eq!(service.get_progress(id).unwrap().kind, ProgressKind::JobFailed);
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let service = service();
        let first = service.submit(sample_request()).await.unwrap();
        let second = service.submit(sample_request()).await.unwrap();
        service.wait(first).await.unwrap();
        service.wait(second).await.unwrap();

        let completed = JobQuery::all().with_status(JobStatus::Completed);
        assert_eq!(service.list(&completed).await.unwrap().len(), 2);

        assert!(service.delete(first).await.unwrap());
        assert!(!service.delete(first).await.unwrap());
        assert!(service.get_status(first).await.unwrap_err().is_not_found());
        assert_eq!(service.list(&JobQuery::all()).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_running_jobs() {
        let service = service_with(&slow_stages(), &Settings::default());
        let id = service.submit(sample_request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        service.shutdown("shutting down").await;

        let job = service.get_status(id).await.unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.error_kind(), Some(FailureKind::Cancelled));
    }
}
