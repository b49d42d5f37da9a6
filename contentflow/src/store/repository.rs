//! Repository trait and the in-memory backend.

use crate::core::{ContentJob, JobId, JobStatus};
use crate::errors::StoreError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;

/// Filter and paging for [`JobRepository::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    /// Only jobs in this status.
    pub status: Option<JobStatus>,
    /// Maximum number of jobs returned.
    pub limit: Option<usize>,
    /// Jobs skipped before the first returned one.
    pub offset: usize,
}

impl JobQuery {
    /// Matches every job.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Filters by status.
    #[must_use]
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Limits the page size.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` matches.
    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Returns true if the job passes the status filter.
    #[must_use]
    pub fn matches(&self, job: &ContentJob) -> bool {
        self.status.map_or(true, |status| job.status() == status)
    }

    /// Sorts newest first and applies offset and limit.
    pub(crate) fn page(&self, mut jobs: Vec<ContentJob>) -> Vec<ContentJob> {
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Durable storage for content jobs.
///
/// `save` is an upsert keyed by the job id. After every transition the
/// sequencer saves its copy, so a reader sees a stage's output before the
/// next stage begins.
#[async_trait]
pub trait JobRepository: Send + Sync + Debug {
    /// Inserts or replaces the job.
    async fn save(&self, job: &ContentJob) -> Result<(), StoreError>;

    /// Loads a job, failing with [`StoreError::NotFound`] when absent.
    async fn load(&self, id: JobId) -> Result<ContentJob, StoreError>;

    /// Removes a job. Returns false if it did not exist.
    async fn delete(&self, id: JobId) -> Result<bool, StoreError>;

    /// Lists jobs newest first.
    async fn list(&self, query: &JobQuery) -> Result<Vec<ContentJob>, StoreError>;

    /// Counts jobs, optionally in one status.
    async fn count(&self, status: Option<JobStatus>) -> Result<usize, StoreError>;
}

/// Repository backed by a map, for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<JobId, ContentJob>>,
}

impl InMemoryJobRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn save(&self, job: &ContentJob) -> Result<(), StoreError> {
        self.jobs.write().insert(job.id, job.clone());
        Ok(())
    }

    async fn load(&self, id: JobId) -> Result<ContentJob, StoreError> {
        self.jobs
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn delete(&self, id: JobId) -> Result<bool, StoreError> {
        Ok(self.jobs.write().remove(&id).is_some())
    }

    async fn list(&self, query: &JobQuery) -> Result<Vec<ContentJob>, StoreError> {
        let matching = self
            .jobs
            .read()
            .values()
            .filter(|job| query.matches(job))
            .cloned()
            .collect();
        Ok(query.page(matching))
    }

    async fn count(&self, status: Option<JobStatus>) -> Result<usize, StoreError> {
        let jobs = self.jobs.read();
        Ok(match status {
            Some(status) => jobs.values().filter(|job| job.status() == status).count(),
            None => jobs.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ContentRequest;
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;

    fn job_created(minutes_ago: i64) -> ContentJob {
        let mut job = ContentJob::new(ContentRequest::new("AI adoption"));
        job.created_at -= ChronoDuration::minutes(minutes_ago);
        job
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let repo = InMemoryJobRepository::new();
        let job = job_created(0);

        repo.save(&job).await.unwrap();
        assert_eq!(repo.load(job.id).await.unwrap(), job);
        assert_eq!(repo.len(), 1);

        assert!(repo.delete(job.id).await.unwrap());
        assert!(!repo.delete(job.id).await.unwrap());
        assert!(matches!(
            repo.load(job.id).await,
            Err(StoreError::NotFound(id)) if id == job.id
        ));
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let repo = InMemoryJobRepository::new();
        let mut job = job_created(0);
        repo.save(&job).await.unwrap();

        job.transition_to(JobStatus::Researching).unwrap();
        repo.save(&job).await.unwrap();

        assert_eq!(repo.load(job.id).await.unwrap().status(), JobStatus::Researching);
        assert_eq!(repo.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_newest_first_with_paging() {
        let repo = InMemoryJobRepository::new();
        let oldest = job_created(30);
        let middle = job_created(20);
        let mut newest = job_created(10);
        newest.transition_to(JobStatus::Researching).unwrap();
        for job in [&oldest, &middle, &newest] {
            repo.save(job).await.unwrap();
        }

        let ids: Vec<JobId> = repo
            .list(&JobQuery::all())
            .await
            .unwrap()
            .iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(ids, vec![newest.id, middle.id, oldest.id]);

        let page = repo
            .list(&JobQuery::all().with_offset(1).with_limit(1))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, middle.id);

        let pending = repo
            .list(&JobQuery::all().with_status(JobStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(repo.count(Some(JobStatus::Researching)).await.unwrap(), 1);
    }
}
