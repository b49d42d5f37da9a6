//! Content generation request.

use super::{ContentType, Tone};
use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};

/// Minimum topic length in characters.
pub const MIN_TOPIC_LEN: usize = 5;
/// Maximum topic length in characters.
pub const MAX_TOPIC_LEN: usize = 500;
/// Minimum target word count.
pub const MIN_WORD_COUNT: u32 = 100;
/// Maximum target word count.
pub const MAX_WORD_COUNT: u32 = 10_000;

fn default_language() -> String {
    "en".to_string()
}

const fn default_word_count() -> u32 {
    1500
}

/// What the caller asked for when submitting a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRequest {
    /// Topic or idea to write about.
    pub topic: String,
    /// Kind of content.
    #[serde(default)]
    pub content_type: ContentType,
    /// Writing tone.
    #[serde(default)]
    pub tone: Tone,
    /// Target language code.
    #[serde(default = "default_language")]
    pub language: String,
    /// Target word count.
    #[serde(default = "default_word_count")]
    pub word_count: u32,
    /// SEO keywords to include, in priority order.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Target audience description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    /// Extra instructions for the agents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_instructions: Option<String>,
}

impl ContentRequest {
    /// Creates a request with defaults for everything but the topic.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            content_type: ContentType::default(),
            tone: Tone::default(),
            language: default_language(),
            word_count: default_word_count(),
            keywords: Vec::new(),
            target_audience: None,
            additional_instructions: None,
        }
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Sets the tone.
    #[must_use]
    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    /// Sets the language code.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Sets the target word count.
    #[must_use]
    pub fn with_word_count(mut self, word_count: u32) -> Self {
        self.word_count = word_count;
        self
    }

    /// Sets the keywords.
    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the target audience.
    #[must_use]
    pub fn with_target_audience(mut self, audience: impl Into<String>) -> Self {
        self.target_audience = Some(audience.into());
        self
    }

    /// Sets additional instructions.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.additional_instructions = Some(instructions.into());
        self
    }

    /// Checks the request against the accepted bounds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let topic_len = self.topic.trim().chars().count();
        if topic_len < MIN_TOPIC_LEN || topic_len > MAX_TOPIC_LEN {
            return Err(ValidationError::new(
                "topic",
                format!("must be between {MIN_TOPIC_LEN} and {MAX_TOPIC_LEN} characters, got {topic_len}"),
            ));
        }

        if !(MIN_WORD_COUNT..=MAX_WORD_COUNT).contains(&self.word_count) {
            return Err(ValidationError::new(
                "word_count",
                format!(
                    "must be between {MIN_WORD_COUNT} and {MAX_WORD_COUNT}, got {}",
                    self.word_count
                ),
            ));
        }

        if self.language.trim().is_empty() {
            return Err(ValidationError::new("language", "must not be empty"));
        }

        if self.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ValidationError::new("keywords", "must not contain blank entries"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let request = ContentRequest::new("AI adoption");
        assert_eq!(request.content_type, ContentType::BlogPost);
        assert_eq!(request.tone, Tone::Professional);
        assert_eq!(request.language, "en");
        assert_eq!(request.word_count, 1500);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_topic_too_short() {
        let err = ContentRequest::new("  AI ").validate().unwrap_err();
        assert_eq!(err.field, "topic");
    }

    #[test]
    fn test_word_count_bounds() {
        let request = ContentRequest::new("AI adoption").with_word_count(50);
        assert_eq!(request.validate().unwrap_err().field, "word_count");

        let request = ContentRequest::new("AI adoption").with_word_count(10_000);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_blank_keyword_rejected() {
        let request = ContentRequest::new("AI adoption").with_keywords(["ai", " "]);
        assert_eq!(request.validate().unwrap_err().field, "keywords");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let request: ContentRequest =
            serde_json::from_str(r#"{"topic": "AI adoption", "word_count": 500}"#).unwrap();
        assert_eq!(request.word_count, 500);
        assert_eq!(request.language, "en");
        assert!(request.keywords.is_empty());
    }
}
