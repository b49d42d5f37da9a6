//! Application settings.
//!
//! [`Settings`] is an explicit value handed to the pipeline, the agents and
//! the job service. It loads from a JSON file, from `CONTENTFLOW_*`
//! environment variables, or both (file first, environment on top).

#[cfg(feature = "anthropic")]
use crate::agents::{AnthropicClient, AnthropicConfig};
use crate::agents::{stages_for, AgentConfig, LlmClient, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use crate::errors::{ConfigError, PipelineValidationError};
use crate::pipeline::{ContentPipeline, PipelineBuilder, StageSpec, DEFAULT_OBSERVER_TIMEOUT};
use crate::retry::RetryPolicy;
use crate::stages::{Stage, StageKind};
use crate::store::{CacheTtls, RateLimiter};
use crate::utils::durations;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "CONTENTFLOW_";

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Deployment environment name.
    #[serde(default = "default_app_env")]
    pub app_env: String,
    /// Stage list and timing.
    #[serde(default)]
    pub pipeline: PipelineSettings,
    /// Model settings.
    #[serde(default)]
    pub llm: LlmSettings,
    /// Cache lifetimes.
    #[serde(default)]
    pub cache: CacheSettings,
    /// Submission quota.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    /// Logging.
    #[serde(default)]
    pub log: LogSettings,
}

fn default_app_env() -> String {
    "development".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_env: default_app_env(),
            pipeline: PipelineSettings::default(),
            llm: LlmSettings::default(),
            cache: CacheSettings::default(),
            rate_limit: RateLimitSettings::default(),
            log: LogSettings::default(),
        }
    }
}

/// Which stages run and how long they may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Stages, in order.
    #[serde(default = "default_stages")]
    pub stages: Vec<StageKind>,
    /// Retry policy for stages without an override.
    #[serde(default = "RetryPolicy::llm")]
    pub retry: RetryPolicy,
    /// Per-stage retry overrides.
    #[serde(default)]
    pub stage_retry: HashMap<StageKind, RetryPolicy>,
    /// Limit on a single stage attempt.
    #[serde(default = "default_stage_timeout", with = "durations::option_millis")]
    pub stage_timeout_ms: Option<Duration>,
    /// Limit on each progress notification.
    #[serde(default = "default_observer_timeout", with = "durations::millis")]
    pub observer_timeout_ms: Duration,
    /// Limit on the whole run.
    #[serde(default = "default_generation_timeout", with = "durations::option_millis")]
    pub generation_timeout_ms: Option<Duration>,
}

fn default_stages() -> Vec<StageKind> {
    StageKind::STANDARD.to_vec()
}

#[allow(clippy::unnecessary_wraps)]
fn default_stage_timeout() -> Option<Duration> {
    Some(Duration::from_secs(120))
}

fn default_observer_timeout() -> Duration {
    DEFAULT_OBSERVER_TIMEOUT
}

#[allow(clippy::unnecessary_wraps)]
fn default_generation_timeout() -> Option<Duration> {
    Some(Duration::from_secs(300))
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            stages: default_stages(),
            retry: RetryPolicy::llm(),
            stage_retry: HashMap::new(),
            stage_timeout_ms: default_stage_timeout(),
            observer_timeout_ms: default_observer_timeout(),
            generation_timeout_ms: default_generation_timeout(),
        }
    }
}

impl PipelineSettings {
    /// Retry policy for one stage kind.
    #[must_use]
    pub fn retry_for(&self, kind: StageKind) -> &RetryPolicy {
        self.stage_retry.get(&kind).unwrap_or(&self.retry)
    }

    /// Starts a pipeline builder carrying these settings.
    ///
    /// Stages whose name parses as a [`StageKind`] pick up that kind's retry
    /// override; others use the default policy.
    #[must_use]
    pub fn builder(&self, name: &str, stages: Vec<Arc<dyn Stage>>) -> PipelineBuilder {
        let mut builder = PipelineBuilder::new(name)
            .default_retry(self.retry.clone())
            .observer_timeout(self.observer_timeout_ms);
        if let Some(timeout) = self.stage_timeout_ms {
            builder = builder.default_timeout(timeout);
        }
        if let Some(timeout) = self.generation_timeout_ms {
            builder = builder.generation_timeout(timeout);
        }
        for stage in stages {
            let spec = match stage.name().parse::<StageKind>() {
                Ok(kind) if self.stage_retry.contains_key(&kind) => {
                    StageSpec::new(stage).with_retry(self.retry_for(kind).clone())
                }
                _ => StageSpec::new(stage),
            };
            builder = builder.stage_spec(spec);
        }
        builder
    }
}

/// Model and provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion budget.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Provider API key.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Provider base URL override.
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key: None,
            base_url: None,
        }
    }
}

impl LlmSettings {
    /// The agent configuration these settings describe.
    #[must_use]
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig::default()
            .with_model(self.model.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }

    /// Connection settings for the Anthropic client.
    ///
    /// # Errors
    ///
    /// Fails when no API key is configured.
    #[cfg(feature = "anthropic")]
    pub fn anthropic_config(&self) -> Result<AnthropicConfig, ConfigError> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::Invalid("llm.api_key is required".into()))?;
        let config = AnthropicConfig::new(api_key);
        Ok(match &self.base_url {
            Some(base_url) => config.with_base_url(base_url.trim_end_matches('/')),
            None => config,
        })
    }

    /// Builds the Anthropic client these settings describe.
    ///
    /// # Errors
    ///
    /// Fails when no API key is configured or the HTTP client cannot be
    /// built.
    #[cfg(feature = "anthropic")]
    pub fn anthropic_client(&self) -> Result<AnthropicClient, ConfigError> {
        AnthropicClient::new(self.anthropic_config()?)
            .map_err(|e| ConfigError::Invalid(format!("llm client: {e}")))
    }
}

/// Cache lifetimes in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Job snapshots.
    #[serde(default = "default_content_ttl")]
    pub content_ttl_secs: u64,
    /// Statuses.
    #[serde(default = "default_content_ttl")]
    pub status_ttl_secs: u64,
    /// Progress events.
    #[serde(default = "default_progress_ttl")]
    pub progress_ttl_secs: u64,
}

fn default_content_ttl() -> u64 {
    3600
}

fn default_progress_ttl() -> u64 {
    300
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            content_ttl_secs: default_content_ttl(),
            status_ttl_secs: default_content_ttl(),
            progress_ttl_secs: default_progress_ttl(),
        }
    }
}

impl CacheSettings {
    /// Converts to cache lifetimes.
    #[must_use]
    pub fn ttls(&self) -> CacheTtls {
        CacheTtls {
            content: Duration::from_secs(self.content_ttl_secs),
            status: Duration::from_secs(self.status_ttl_secs),
            progress: Duration::from_secs(self.progress_ttl_secs),
        }
    }
}

/// Submissions allowed per client in each window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Submissions per window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Window length in seconds.
    #[serde(default = "default_window")]
    pub window_secs: u64,
}

fn default_max_requests() -> u32 {
    10
}

fn default_window() -> u64 {
    60
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window(),
        }
    }
}

impl RateLimitSettings {
    /// Builds a limiter with these settings.
    #[must_use]
    pub fn limiter(&self) -> RateLimiter {
        RateLimiter::new(self.max_requests, Duration::from_secs(self.window_secs))
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    /// Level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Settings {
    /// Reads settings from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed, or the values are out
    /// of range.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults overlaid with the process environment.
    ///
    /// # Errors
    ///
    /// Fails when a variable holds an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        settings.apply_env(|name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Overlays variables read through `lookup`.
    ///
    /// Recognised: `CONTENTFLOW_ENV`, `CONTENTFLOW_LOG_LEVEL`,
    /// `CONTENTFLOW_LOG_JSON`, `CONTENTFLOW_MAX_ATTEMPTS`,
    /// `CONTENTFLOW_STAGE_TIMEOUT_SECS`, `CONTENTFLOW_LLM_MODEL`,
    /// `CONTENTFLOW_LLM_BASE_URL` and `ANTHROPIC_API_KEY`.
    ///
    /// # Errors
    ///
    /// Fails when a numeric or boolean variable does not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            lookup(&format!("{ENV_PREFIX}{suffix}")).filter(|v| !v.trim().is_empty())
        };

        if let Some(env) = var("ENV") {
            self.app_env = env;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log.level = level;
        }
        if let Some(json) = var("LOG_JSON") {
            self.log.json = parse_env("CONTENTFLOW_LOG_JSON", &json)?;
        }
        if let Some(attempts) = var("MAX_ATTEMPTS") {
            self.pipeline.retry.max_attempts = parse_env("CONTENTFLOW_MAX_ATTEMPTS", &attempts)?;
        }
        if let Some(secs) = var("STAGE_TIMEOUT_SECS") {
            let secs: u64 = parse_env("CONTENTFLOW_STAGE_TIMEOUT_SECS", &secs)?;
            self.pipeline.stage_timeout_ms = Some(Duration::from_secs(secs));
        }
        if let Some(model) = var("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = var("LLM_BASE_URL") {
            self.llm.base_url = Some(base_url);
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.llm.api_key = Some(key);
        }
        Ok(())
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.stages.is_empty() {
            return Err(ConfigError::Invalid("pipeline.stages must not be empty".into()));
        }
        self.pipeline.retry.validate()?;
        for policy in self.pipeline.stage_retry.values() {
            policy.validate()?;
        }
        for (name, value) in [
            ("pipeline.stage_timeout_ms", self.pipeline.stage_timeout_ms),
            ("pipeline.generation_timeout_ms", self.pipeline.generation_timeout_ms),
        ] {
            if value.is_some_and(|d| d.is_zero()) {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::Invalid("llm.max_tokens must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(format!(
                "llm.temperature must be within [0, 1], got {}",
                self.llm.temperature
            )));
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            return Err(ConfigError::Invalid("rate_limit values must be positive".into()));
        }
        Ok(())
    }

    /// Starts a builder over agents for `pipeline.stages`, in that order.
    #[must_use]
    pub fn pipeline_builder(&self, name: &str, client: &Arc<dyn LlmClient>) -> PipelineBuilder {
        let stages = stages_for(&self.pipeline.stages, client, &self.llm.agent_config());
        self.pipeline.builder(name, stages)
    }

    /// Builds the `content` pipeline these settings describe.
    pub fn content_pipeline(
        &self,
        client: &Arc<dyn LlmClient>,
    ) -> Result<ContentPipeline, PipelineValidationError> {
        self.pipeline_builder("content", client).build()
    }

    /// Returns true in the production environment.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        name: name.to_string(),
        message: e.to_string(),
    })
}
