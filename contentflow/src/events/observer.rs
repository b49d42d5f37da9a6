//! Observer trait and the in-process implementations.

use super::ProgressEvent;
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info, warn, Level};

/// Receives progress notifications from the sequencer.
///
/// An error is logged by the caller and never fails the job.
#[async_trait]
pub trait ProgressObserver: Send + Sync + Debug {
    /// Handles one event.
    async fn on_progress(&self, event: &ProgressEvent) -> anyhow::Result<()>;
}

/// An observer that discards all events.
///
/// Used when no observer is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

#[async_trait]
impl ProgressObserver for NoOpObserver {
    async fn on_progress(&self, _event: &ProgressEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// An observer that logs events with tracing.
#[derive(Debug, Clone)]
pub struct LoggingObserver {
    level: Level,
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingObserver {
    /// Creates a logging observer with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging observer.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

#[async_trait]
impl ProgressObserver for LoggingObserver {
    async fn on_progress(&self, event: &ProgressEvent) -> anyhow::Result<()> {
        let stage = event.stage.as_deref().unwrap_or("-");
        if self.level == Level::DEBUG {
            debug!(
                job_id = %event.job_id,
                stage,
                status = %event.status,
                progress = event.progress,
                "{}", event.message
            );
        } else {
            info!(
                job_id = %event.job_id,
                stage,
                status = %event.status,
                progress = event.progress,
                "{}", event.message
            );
        }
        Ok(())
    }
}

/// An observer that keeps every event, for tests.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    events: RwLock<Vec<ProgressEvent>>,
}

impl CollectingObserver {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Stage names in the order their events arrived, consecutive repeats
    /// collapsed.
    #[must_use]
    pub fn stage_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        for stage in self.events.read().iter().filter_map(|e| e.stage.clone()) {
            if order.last() != Some(&stage) {
                order.push(stage);
            }
        }
        order
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

#[async_trait]
impl ProgressObserver for CollectingObserver {
    async fn on_progress(&self, event: &ProgressEvent) -> anyhow::Result<()> {
        self.events.write().push(event.clone());
        Ok(())
    }
}

/// Forwards each event to several observers concurrently.
///
/// One failing observer does not keep the others from seeing the event;
/// failures are logged and the first one is returned.
#[derive(Debug, Default, Clone)]
pub struct FanoutObserver {
    observers: Vec<Arc<dyn ProgressObserver>>,
}

impl FanoutObserver {
    /// Creates an empty fanout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer.
    #[must_use]
    pub fn with(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Number of observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns true if there are no observers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

#[async_trait]
impl ProgressObserver for FanoutObserver {
    async fn on_progress(&self, event: &ProgressEvent) -> anyhow::Result<()> {
        let results = join_all(self.observers.iter().map(|o| o.on_progress(event))).await;
        let mut first_error = None;
        for err in results.into_iter().filter_map(Result::err) {
            warn!(job_id = %event.job_id, error = %err, "Progress observer failed");
            first_error.get_or_insert(err);
        }
        first_error.map_or(Ok(()), Err)
    }
}
