//! TTL cache for job snapshots, statuses and progress.

use crate::core::{ContentJob, JobId, JobStatus};
use crate::events::{ProgressEvent, ProgressObserver};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Lifetimes of the three cache families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    /// Job snapshots.
    pub content: Duration,
    /// Job statuses.
    pub status: Duration,
    /// Latest progress events.
    pub progress: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            content: Duration::from_secs(3600),
            status: Duration::from_secs(3600),
            progress: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug)]
struct TtlMap<V> {
    entries: DashMap<JobId, Entry<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlMap<V> {
    fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    fn insert(&self, key: JobId, value: V) {
        let expires_at = Instant::now() + self.ttl;
        self.entries.insert(key, Entry { value, expires_at });
    }

    fn get(&self, key: &JobId) -> Option<V> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    fn remove(&self, key: &JobId) {
        self.entries.remove(key);
    }

    fn purge(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }
}

/// Read-through cache in front of the repository.
///
/// Keys are job ids in three independent families, each with its own TTL.
/// Expired entries are dropped on read and by [`JobCache::purge_expired`].
#[derive(Debug)]
pub struct JobCache {
    content: TtlMap<ContentJob>,
    status: TtlMap<JobStatus>,
    progress: TtlMap<ProgressEvent>,
}

impl Default for JobCache {
    fn default() -> Self {
        Self::new(CacheTtls::default())
    }
}

impl JobCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(ttls: CacheTtls) -> Self {
        Self {
            content: TtlMap::new(ttls.content),
            status: TtlMap::new(ttls.status),
            progress: TtlMap::new(ttls.progress),
        }
    }

    /// Caches a job snapshot and its status.
    pub fn put_job(&self, job: &ContentJob) {
        self.content.insert(job.id, job.clone());
        self.status.insert(job.id, job.status());
    }

    /// Cached snapshot, if fresh.
    #[must_use]
    pub fn job(&self, id: JobId) -> Option<ContentJob> {
        self.content.get(&id)
    }

    /// Caches a status on its own.
    pub fn put_status(&self, id: JobId, status: JobStatus) {
        self.status.insert(id, status);
    }

    /// Cached status, if fresh.
    #[must_use]
    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.status.get(&id)
    }

    /// Caches the latest progress event of a job.
    pub fn put_progress(&self, event: &ProgressEvent) {
        self.progress.insert(event.job_id, event.clone());
    }

    /// Latest progress event, if fresh.
    #[must_use]
    pub fn progress(&self, id: JobId) -> Option<ProgressEvent> {
        self.progress.get(&id)
    }

    /// Drops every entry of a job.
    pub fn invalidate(&self, id: JobId) {
        self.content.remove(&id);
        self.status.remove(&id);
        self.progress.remove(&id);
    }

    /// Drops expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        self.content.purge(now) + self.status.purge(now) + self.progress.purge(now)
    }
}

/// Observer that records each event's status and progress in a [`JobCache`].
#[derive(Debug, Clone)]
pub struct CacheProgressObserver {
    cache: Arc<JobCache>,
}

impl CacheProgressObserver {
    /// Creates an observer writing into `cache`.
    #[must_use]
    pub fn new(cache: Arc<JobCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl ProgressObserver for CacheProgressObserver {
    async fn on_progress(&self, event: &ProgressEvent) -> anyhow::Result<()> {
        self.cache.put_status(event.job_id, event.status);
        self.cache.put_progress(event);
        Ok(())
    }
}
