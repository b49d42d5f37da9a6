//! Retry policy and backoff delay calculation.

use crate::errors::ConfigError;
use crate::utils::durations;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lower bound of the jitter factor applied to a computed delay.
pub const JITTER_MIN_FACTOR: f64 = 0.5;
/// Upper bound of the jitter factor applied to a computed delay.
pub const JITTER_MAX_FACTOR: f64 = 1.5;

/// Bounded exponential-backoff retry configuration.
///
/// Attempt `n` (1-indexed, `n >= 2`) waits
/// `min(initial_delay * backoff_multiplier^(n-2), max_delay)` before it
/// starts, optionally perturbed by up to ±50 % jitter and clamped to
/// `[0, max_delay]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    pub max_attempts: usize,
    /// Delay before the second attempt.
    #[serde(rename = "initial_delay_ms", with = "durations::millis")]
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    #[serde(rename = "max_delay_ms", with = "durations::millis")]
    pub max_delay: Duration,
    /// Geometric growth factor between consecutive delays.
    pub backoff_multiplier: f64,
    /// Whether to randomize delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy for LLM calls: slower start, longer ceiling.
    #[must_use]
    pub fn llm() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            ..Self::default()
        }
    }

    /// Policy for plain network calls: more, quicker attempts.
    #[must_use]
    pub fn network() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            ..Self::default()
        }
    }

    /// A single attempt, no retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Checks that the policy is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be >= 1".to_string(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "retry.backoff_multiplier must be a finite number >= 1, got {}",
                self.backoff_multiplier
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(ConfigError::Invalid(format!(
                "retry.initial_delay ({:?}) exceeds retry.max_delay ({:?})",
                self.initial_delay, self.max_delay
            )));
        }
        Ok(())
    }

    /// Delay before `attempt` without jitter.
    ///
    /// The first attempt never waits.
    #[must_use]
    pub fn base_delay(&self, attempt: usize) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let nanos = self.initial_delay.as_nanos() as f64 * self.backoff_multiplier.powi(exponent);
        #[allow(clippy::cast_precision_loss)]
        let cap = self.max_delay.as_nanos() as f64;
        if !nanos.is_finite() || nanos >= cap {
            return self.max_delay;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let nanos = nanos.max(0.0).round() as u64;
        Duration::from_nanos(nanos)
    }

    /// Delay before `attempt`, with jitter applied when enabled.
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let base = self.base_delay(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }

        let factor = rand::thread_rng().gen_range(JITTER_MIN_FACTOR..=JITTER_MAX_FACTOR);
        base.mul_f64(factor).min(self.max_delay)
    }
}
