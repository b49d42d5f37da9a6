//! Broadcast observer feeding live subscribers such as websocket sessions.

use super::{ProgressEvent, ProgressObserver};
use crate::core::JobId;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 256;

/// Publishes every event on a tokio broadcast channel.
///
/// Having no subscriber is not an error. Slow subscribers lag and lose the
/// oldest events rather than holding up the sequencer.
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    sender: broadcast::Sender<ProgressEvent>,
}

impl Default for BroadcastObserver {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastObserver {
    /// Creates an observer whose channel holds up to `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to events for every job.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Subscribes to events for one job.
    #[must_use]
    pub fn subscribe_job(&self, job_id: JobId) -> JobSubscription {
        JobSubscription {
            job_id,
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl ProgressObserver for BroadcastObserver {
    async fn on_progress(&self, event: &ProgressEvent) -> anyhow::Result<()> {
        if self.sender.send(event.clone()).is_err() {
            trace!(job_id = %event.job_id, "No progress subscribers");
        }
        Ok(())
    }
}

/// A receiver filtered to a single job.
#[derive(Debug)]
pub struct JobSubscription {
    job_id: JobId,
    receiver: broadcast::Receiver<ProgressEvent>,
}

impl JobSubscription {
    /// The job this subscription follows.
    #[must_use]
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Waits for the next event of this job.
    ///
    /// Returns `None` once the channel closes. Lagged events are skipped.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.job_id == self.job_id => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    trace!(job_id = %self.job_id, skipped, "Progress subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JobStatus;
    use crate::events::ProgressKind;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let observer = BroadcastObserver::default();
        assert_eq!(observer.subscriber_count(), 0);

        let event = ProgressEvent::new(JobId::new(), ProgressKind::JobCompleted, JobStatus::Completed, "done");
        observer.on_progress(&event).await.unwrap();
    }

    #[tokio::test]
    async fn test_job_subscription_filters_other_jobs() {
        let observer = BroadcastObserver::new(16);
        let watched = JobId::new();
        let mut subscription = observer.subscribe_job(watched);
        assert_eq!(subscription.job_id(), watched);

        let other = ProgressEvent::new(JobId::new(), ProgressKind::StageStarted, JobStatus::Researching, "other");
        let mine = ProgressEvent::new(watched, ProgressKind::StageStarted, JobStatus::Researching, "mine")
            .with_stage("research");
        observer.on_progress(&other).await.unwrap();
        observer.on_progress(&mine).await.unwrap();

        let received = subscription.next().await.unwrap();
        assert_eq!(received.message, "mine");
        assert_eq!(received.stage.as_deref(), Some("research"));
    }

    #[test]
    fn test_subscription_waits_for_its_job() {
        let observer = BroadcastObserver::new(16);
        let watched = JobId::new();
        let mut subscription = observer.subscribe_job(watched);

        let mut next = tokio_test::task::spawn(subscription.next());
        tokio_test::assert_pending!(next.poll());

        let other = ProgressEvent::new(JobId::new(), ProgressKind::JobCompleted, JobStatus::Completed, "other");
        tokio_test::block_on(observer.on_progress(&other)).unwrap();
        tokio_test::assert_pending!(next.poll());

        let mine = ProgressEvent::new(watched, ProgressKind::JobCompleted, JobStatus::Completed, "mine");
        tokio_test::block_on(observer.on_progress(&mine)).unwrap();
        assert!(next.is_woken());
        let event = tokio_test::assert_ready!(next.poll()).unwrap();
        assert_eq!(event.message, "mine");
    }

    #[tokio::test]
    async fn test_subscription_ends_when_observer_dropped() {
        let observer = BroadcastObserver::new(4);
        let mut subscription = observer.subscribe_job(JobId::new());
        drop(observer);
        assert!(subscription.next().await.is_none());
    }
}
