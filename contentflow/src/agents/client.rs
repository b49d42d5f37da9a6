//! LLM client abstraction and agent configuration.

use crate::errors::StageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Default model for every agent.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
/// Default completion budget.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Model settings an agent is constructed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl AgentConfig {
    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the token budget.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Builds a request for this configuration.
    #[must_use]
    pub fn request(&self, system: impl Into<String>, user: impl Into<String>) -> LlmRequest {
        LlmRequest {
            system: system.into(),
            user: user.into(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// One completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    /// System prompt.
    pub system: String,
    /// User message.
    pub user: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

/// A completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResponse {
    /// Generated text.
    pub content: String,
    /// Why generation stopped, when the provider says.
    pub stop_reason: Option<String>,
}

impl LlmResponse {
    /// Creates a response with only text.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            stop_reason: None,
        }
    }
}

/// The LLM provider seam.
///
/// Implementations classify their failures: rate limits, overload and
/// transport problems are [`StageError::Transient`]; rejected requests are
/// [`StageError::Permanent`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    /// Sends one request.
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, StageError>;
}

/// Calls the client and rejects blank completions.
pub(crate) async fn complete_text(
    client: &dyn LlmClient,
    config: &AgentConfig,
    system: &str,
    user: String,
) -> Result<String, StageError> {
    let response = client.complete(config.request(system, user)).await?;
    if response.content.trim().is_empty() {
        return Err(StageError::permanent("model returned an empty response"));
    }
    Ok(response.content)
}

/// Strips a bullet marker, returning the item text.
pub(crate) fn bullet_item(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(['-', '*', '\u{2022}'])?;
    let item = rest.trim_start_matches(['-', '*', '\u{2022}', ' ']).trim();
    (!item.is_empty()).then_some(item)
}
