//! Research agent.

use super::client::{bullet_item, complete_text, AgentConfig, LlmClient};
use crate::core::{ContentJob, JobStatus, ResearchNotes, StageOutput};
use crate::errors::StageError;
use crate::stages::Stage;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are an expert researcher. Gather accurate, recent and \
credible information about the topic you are given: key facts, statistics, quotes from \
authorities, sources, and what others are already saying about it. Prefer surprising facts, \
real examples and angles competitors miss.

Answer with these headed sections, one bullet per finding:
Key Facts:
Statistics:
Expert Quotes:
Sources:
Competitor Insights:";

/// Gathers facts, statistics and sources about the topic.
#[derive(Debug, Clone)]
pub struct ResearchAgent {
    client: Arc<dyn LlmClient>,
    config: AgentConfig,
}

impl ResearchAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new(client: Arc<dyn LlmClient>, config: AgentConfig) -> Self {
        Self { client, config }
    }

    fn prompt(job: &ContentJob) -> String {
        let request = &job.request;
        let audience = request.target_audience.as_deref().unwrap_or("General audience");
        let mut lines = vec![
            "Research the following topic thoroughly.\n".to_string(),
            format!("TOPIC: {}", request.topic),
            format!("CONTENT TYPE: {}", request.content_type),
            format!("TARGET AUDIENCE: {audience}"),
            format!("LANGUAGE: {}", request.language),
        ];
        if !request.keywords.is_empty() {
            lines.push(format!("KEYWORDS: {}", request.keywords.join(", ")));
        }
        if let Some(extra) = &request.additional_instructions {
            lines.push(format!("CONTEXT: {extra}"));
        }
        lines.push(format!(
            "\nFind at least five key facts, supporting statistics, expert opinions, \
             competitor coverage and unique angles that would resonate with {audience}."
        ));
        lines.join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Facts,
    Statistics,
    Quotes,
    Sources,
    Competitors,
}

fn section_heading(line: &str) -> Option<Section> {
    let is_heading = line.starts_with('#') || line.trim_end_matches('*').ends_with(':');
    if !is_heading {
        return None;
    }
    let lower = line.to_lowercase();
    if lower.contains("key fact") || lower.contains("main fact") {
        Some(Section::Facts)
    } else if lower.contains("statistic") || lower.contains("data") {
        Some(Section::Statistics)
    } else if lower.contains("quote") || lower.contains("expert") {
        Some(Section::Quotes)
    } else if lower.contains("source") {
        Some(Section::Sources)
    } else if lower.contains("competitor") || lower.contains("insight") {
        Some(Section::Competitors)
    } else {
        None
    }
}

/// Sorts bullet items under the section heading that precedes them.
///
/// Bullets before any heading, and headings the parser does not know, are
/// ignored.
#[must_use]
pub fn parse_research(text: &str) -> ResearchNotes {
    let mut notes = ResearchNotes::default();
    let mut current = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(section) = section_heading(line) {
            current = Some(section);
        } else if let Some(item) = bullet_item(line) {
            let target = match current {
                Some(Section::Facts) => &mut notes.key_facts,
                Some(Section::Statistics) => &mut notes.statistics,
                Some(Section::Quotes) => &mut notes.quotes,
                Some(Section::Sources) => &mut notes.sources,
                Some(Section::Competitors) => &mut notes.competitor_insights,
                None => continue,
            };
            target.push(item.to_string());
        }
    }

    notes
}

#[async_trait]
impl Stage for ResearchAgent {
    fn name(&self) -> &str {
        "research"
    }

    fn status(&self) -> JobStatus {
        JobStatus::Researching
    }

    async fn run(&self, job: &ContentJob) -> Result<StageOutput, StageError> {
        let text = complete_text(self.client.as_ref(), &self.config, SYSTEM_PROMPT, Self::prompt(job)).await?;
        let notes = parse_research(&text);
        debug!(findings = notes.len(), "Parsed research notes");
        Ok(StageOutput::research(notes))
    }
}
