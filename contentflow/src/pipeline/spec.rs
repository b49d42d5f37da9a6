//! Per-stage execution settings.

use crate::retry::RetryPolicy;
use crate::stages::Stage;
use std::sync::Arc;
use std::time::Duration;

/// A stage plus the retry policy and attempt timeout it runs under.
///
/// Unset fields fall back to the pipeline defaults.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The stage implementation.
    pub stage: Arc<dyn Stage>,
    /// Retry policy for this stage.
    pub retry: Option<RetryPolicy>,
    /// Bound on each attempt.
    pub timeout: Option<Duration>,
}

impl StageSpec {
    /// Creates a spec using the pipeline defaults.
    #[must_use]
    pub fn new(stage: Arc<dyn Stage>) -> Self {
        Self {
            stage,
            retry: None,
            timeout: None,
        }
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Overrides the attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.stage.name()
    }
}

impl From<Arc<dyn Stage>> for StageSpec {
    fn from(stage: Arc<dyn Stage>) -> Self {
        Self::new(stage)
    }
}
