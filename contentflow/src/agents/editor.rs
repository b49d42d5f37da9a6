//! Editing agent.

use super::client::{complete_text, AgentConfig, LlmClient};
use crate::core::{ContentJob, JobStatus, StageOutput};
use crate::errors::StageError;
use crate::stages::Stage;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are a meticulous editor. Improve the draft you are given: \
fix grammar and spelling, tighten wordy sentences, smooth transitions between sections and \
make sure the tone is consistent. Keep the structure, the facts and the author's voice. \
Return only the edited content, without commentary.";

/// Polishes the draft into the final content.
#[derive(Debug, Clone)]
pub struct EditorAgent {
    client: Arc<dyn LlmClient>,
    config: AgentConfig,
}

impl EditorAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new(client: Arc<dyn LlmClient>, config: AgentConfig) -> Self {
        Self { client, config }
    }

    fn prompt(job: &ContentJob, draft: &str) -> String {
        let request = &job.request;
        let mut lines = vec![format!(
            "Edit this {} for a {} tone, targeting about {} words, in {}.",
            request.content_type, request.tone, request.word_count, request.language
        )];
        if !request.keywords.is_empty() {
            lines.push(format!("Keep these keywords: {}", request.keywords.join(", ")));
        }
        lines.push(format!("\n--- DRAFT ---\n{draft}"));
        lines.join("\n")
    }
}

#[async_trait]
impl Stage for EditorAgent {
    fn name(&self) -> &str {
        "edit"
    }

    fn status(&self) -> JobStatus {
        JobStatus::Editing
    }

    async fn run(&self, job: &ContentJob) -> Result<StageOutput, StageError> {
        let draft = job
            .draft_content
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| StageError::permanent("no draft to edit"))?;
        let edited = complete_text(
            self.client.as_ref(),
            &self.config,
            SYSTEM_PROMPT,
            Self::prompt(job, draft),
        )
        .await?;
        debug!(before = draft.len(), after = edited.len(), "Edited draft");
        Ok(StageOutput::content(edited.trim()))
    }
}
