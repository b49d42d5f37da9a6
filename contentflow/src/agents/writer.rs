//! Writing agent.

use super::client::{complete_text, AgentConfig, LlmClient};
use crate::core::{ContentJob, ContentOutline, JobStatus, StageOutput};
use crate::errors::StageError;
use crate::stages::Stage;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are a professional content writer. Write engaging, \
well-structured content that follows the outline you are given, weaves in the research \
naturally, uses the requested keywords without stuffing them, and keeps to the requested \
tone and length. Use markdown headings for the sections and short paragraphs. Return only \
the content.";

/// Writes the first draft from the outline.
#[derive(Debug, Clone)]
pub struct WriterAgent {
    client: Arc<dyn LlmClient>,
    config: AgentConfig,
}

impl WriterAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new(client: Arc<dyn LlmClient>, config: AgentConfig) -> Self {
        Self { client, config }
    }

    fn prompt(job: &ContentJob, outline: &ContentOutline) -> String {
        let request = &job.request;
        let mut lines = vec![format!(
            "Write a {} of about {} words in a {} tone, in {}.\n",
            request.content_type, request.word_count, request.tone, request.language
        )];
        if let Some(audience) = &request.target_audience {
            lines.push(format!("TARGET AUDIENCE: {audience}"));
        }
        if !request.keywords.is_empty() {
            lines.push(format!("KEYWORDS: {}", request.keywords.join(", ")));
        }

        lines.push("\n--- OUTLINE ---".to_string());
        lines.extend(render_outline(outline));

        if let Some(notes) = job.research_notes.as_ref().filter(|n| !n.is_empty()) {
            lines.push("\n--- RESEARCH TO DRAW ON ---".to_string());
            lines.extend(
                notes
                    .key_facts
                    .iter()
                    .chain(&notes.statistics)
                    .chain(&notes.quotes)
                    .map(|item| format!("- {item}")),
            );
        }

        if let Some(extra) = &request.additional_instructions {
            lines.push(format!("\nADDITIONAL REQUIREMENTS: {extra}"));
        }
        lines.join("\n")
    }
}

/// Renders an outline as indented plain-text lines.
fn render_outline(outline: &ContentOutline) -> Vec<String> {
    let mut lines = vec![format!("Title: {}", outline.title)];
    if !outline.hook.is_empty() {
        lines.push(format!("Hook: {}", outline.hook));
    }
    for (i, section) in outline.sections.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, section.heading));
        lines.extend(section.points.iter().map(|point| format!("   - {point}")));
    }
    if !outline.conclusion_points.is_empty() {
        lines.push("Conclusion:".to_string());
        lines.extend(outline.conclusion_points.iter().map(|point| format!("   - {point}")));
    }
    if let Some(cta) = &outline.cta {
        lines.push(format!("Call to action: {cta}"));
    }
    lines
}

#[async_trait]
impl Stage for WriterAgent {
    fn name(&self) -> &str {
        "write"
    }

    fn status(&self) -> JobStatus {
        JobStatus::Writing
    }

    async fn run(&self, job: &ContentJob) -> Result<StageOutput, StageError> {
        let outline = job
            .outline
            .as_ref()
            .ok_or_else(|| StageError::permanent("no outline to write from"))?;
        let draft = complete_text(
            self.client.as_ref(),
            &self.config,
            SYSTEM_PROMPT,
            Self::prompt(job, outline),
        )
        .await?;
        debug!(chars = draft.len(), "Wrote draft");
        Ok(StageOutput::draft(draft.trim()))
    }
}
