//! Repository storing one JSON document per job.

use super::{JobQuery, JobRepository};
use crate::core::{ContentJob, JobId, JobStatus};
use crate::errors::StoreError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File-backed repository.
///
/// Each job lives in `<dir>/<job_id>.json`. Writes go to a temporary file
/// first and are renamed into place, so readers never see a partial record.
#[derive(Debug, Clone)]
pub struct JsonFileJobRepository {
    dir: PathBuf,
}

impl JsonFileJobRepository {
    /// Opens the repository, creating `dir` if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "Opened job directory");
        Ok(Self { dir })
    }

    /// The storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: JobId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read_all(&self) -> Result<Vec<ContentJob>, StoreError> {
        let mut jobs = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<ContentJob>(&bytes) {
                Ok(job) => jobs.push(job),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Skipping unreadable job file");
                }
            }
        }
        Ok(jobs)
    }
}

#[async_trait]
impl JobRepository for JsonFileJobRepository {
    async fn save(&self, job: &ContentJob) -> Result<(), StoreError> {
        let path = self.path_for(job.id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(job)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load(&self, id: JobId) -> Result<ContentJob, StoreError> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, id: JobId) -> Result<bool, StoreError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self, query: &JobQuery) -> Result<Vec<ContentJob>, StoreError> {
        let matching = self
            .read_all()
            .await?
            .into_iter()
            .filter(|job| query.matches(job))
            .collect();
        Ok(query.page(matching))
    }

    async fn count(&self, status: Option<JobStatus>) -> Result<usize, StoreError> {
        let jobs = self.read_all().await?;
        Ok(jobs
            .iter()
            .filter(|job| status.map_or(true, |s| job.status() == s))
            .count())
    }
}
