//! Anthropic Messages API client.

use super::client::{LlmClient, LlmRequest, LlmResponse};
use crate::errors::StageError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Connection settings for [`AnthropicClient`].
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key sent as `x-api-key`.
    pub api_key: String,
    /// Base URL, without the `/v1/messages` path.
    pub base_url: String,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl AnthropicConfig {
    /// Creates settings for the public endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Overrides the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the HTTP timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`LlmClient`] backed by the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
}

impl AnthropicClient {
    /// Builds the HTTP client.
    ///
    /// # Errors
    ///
    /// Fails when the API key is not a valid header value or the TLS
    /// backend cannot be initialised.
    pub fn new(config: AnthropicConfig) -> Result<Self, StageError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StageError::permanent(format!("http client: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&config.api_key)
                .map_err(|e| StageError::permanent(format!("invalid api key: {e}")))?,
        );

        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            headers,
        })
    }
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

/// Maps an HTTP status to a stage error.
fn classify(status: StatusCode, body: &str) -> StageError {
    let message = format!("anthropic returned {status}: {body}");
    // 529 is the provider's overloaded status
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
        || status.as_u16() == 529
    {
        StageError::Transient(message)
    } else {
        StageError::Permanent(message)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, StageError> {
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &request.system,
            messages: vec![Message {
                role: "user",
                content: &request.user,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| StageError::transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify(status, &text));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| StageError::transient(format!("invalid response body: {e}")))?;
        let content = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        debug!(model = %request.model, chars = content.len(), "Completion received");

        Ok(LlmResponse {
            content,
            stop_reason: parsed.stop_reason,
        })
    }
}
