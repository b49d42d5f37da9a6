//! Retry controller with bounded exponential backoff.
//!
//! - [`RetryPolicy`]: attempts, delays, growth factor, jitter
//! - [`Retrier`], [`retry`], [`retry_if`]: the retry loop as a reusable
//!   controller or a direct call
//! - [`RetryingStage`]: decorates any [`crate::stages::Stage`] with retries

mod controller;
mod policy;
pub(crate) mod stage;

pub use controller::{retry, retry_if, Retrier, RetryOutcome};
pub use policy::{RetryPolicy, JITTER_MAX_FACTOR, JITTER_MIN_FACTOR};
pub use stage::RetryingStage;
