//! Planning agent.

use super::client::{bullet_item, complete_text, AgentConfig, LlmClient};
use crate::core::{ContentJob, ContentOutline, JobStatus, OutlineSection, StageOutput};
use crate::errors::StageError;
use crate::stages::Stage;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = r#"You are an experienced content strategist. Turn the research
you are given into a clear structure: a compelling title, a two or three sentence hook,
three to five sections with three to five points each, conclusion takeaways and a call
to action. Lead with the most valuable information and keep the flow logical.

Respond only with a JSON object of this shape:
{
  "title": "...",
  "hook": "...",
  "sections": [{"header": "...", "purpose": "...", "points": ["..."]}],
  "conclusion_points": ["..."],
  "cta": "..."
}"#;

static JSON_OBJECT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").ok());

/// Produces the content outline from the request and research notes.
#[derive(Debug, Clone)]
pub struct PlannerAgent {
    client: Arc<dyn LlmClient>,
    config: AgentConfig,
}

impl PlannerAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new(client: Arc<dyn LlmClient>, config: AgentConfig) -> Self {
        Self { client, config }
    }

    fn prompt(job: &ContentJob) -> String {
        let request = &job.request;
        let mut lines = vec![
            format!("Create a detailed content outline for: {}\n", request.topic),
            format!("CONTENT TYPE: {}", request.content_type),
            format!("TARGET WORD COUNT: {} words", request.word_count),
            format!("TONE: {}", request.tone),
            format!("LANGUAGE: {}", request.language),
        ];
        if let Some(audience) = &request.target_audience {
            lines.push(format!("TARGET AUDIENCE: {audience}"));
        }
        if !request.keywords.is_empty() {
            lines.push(format!("KEYWORDS TO INCORPORATE: {}", request.keywords.join(", ")));
        }

        if let Some(notes) = &job.research_notes {
            lines.push("\n--- RESEARCH FINDINGS ---".to_string());
            if !notes.key_facts.is_empty() {
                lines.push("Key facts:".to_string());
                lines.extend(
                    notes
                        .key_facts
                        .iter()
                        .take(7)
                        .enumerate()
                        .map(|(i, fact)| format!("  {}. {fact}", i + 1)),
                );
            }
            for (label, items, limit) in [
                ("Statistics", &notes.statistics, 5),
                ("Expert quotes", &notes.quotes, 3),
                ("Competitor insights", &notes.competitor_insights, 3),
            ] {
                if !items.is_empty() {
                    lines.push(format!("{label}:"));
                    lines.extend(items.iter().take(limit).map(|item| format!("  - {item}")));
                }
            }
        }

        if let Some(extra) = &request.additional_instructions {
            lines.push(format!("\nADDITIONAL REQUIREMENTS: {extra}"));
        }
        lines.push("\nRespond only with the JSON object, with no text before or after it.".to_string());
        lines.join("\n")
    }
}

#[derive(Debug, Deserialize)]
struct RawSection {
    #[serde(alias = "header")]
    heading: String,
    #[serde(default)]
    points: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawOutline {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    hook: String,
    #[serde(default)]
    sections: Vec<RawSection>,
    #[serde(default)]
    conclusion_points: Vec<String>,
    #[serde(default)]
    cta: Option<String>,
}

impl From<RawOutline> for ContentOutline {
    fn from(raw: RawOutline) -> Self {
        Self {
            title: raw.title.unwrap_or_else(|| "Untitled".to_string()),
            hook: raw.hook,
            sections: raw
                .sections
                .into_iter()
                .map(|s| OutlineSection {
                    heading: s.heading,
                    points: s.points,
                })
                .collect(),
            conclusion_points: raw.conclusion_points,
            cta: raw.cta,
        }
    }
}

/// Reads an outline from a model response.
///
/// Tries the whole text as JSON, then the outermost `{...}` block inside
/// it, then falls back to reading `Title:`, `Hook:`, `#` headings and
/// bullets line by line.
#[must_use]
pub fn parse_outline(text: &str) -> ContentOutline {
    if let Ok(raw) = serde_json::from_str::<RawOutline>(text.trim()) {
        return raw.into();
    }

    let embedded = JSON_OBJECT
        .as_ref()
        .and_then(|re| re.find(text))
        .map(|m| serde_json::from_str::<RawOutline>(m.as_str()));
    match embedded {
        Some(Ok(raw)) => raw.into(),
        Some(Err(err)) => {
            warn!(error = %err, "Outline JSON did not parse, reading lines instead");
            fallback_outline(text)
        }
        None => fallback_outline(text),
    }
}

fn fallback_outline(text: &str) -> ContentOutline {
    let mut title = None;
    let mut hook = None;
    let mut sections: Vec<OutlineSection> = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let lower = line.to_ascii_lowercase();
        if lower.starts_with("title:") {
            title = Some(line[6..].trim().trim_matches('"').to_string());
        } else if let Some(pos) = lower.find("hook:") {
            hook = Some(line[pos + 5..].trim().trim_matches('"').to_string());
        } else if line.starts_with('#') {
            sections.push(OutlineSection::new(line.trim_start_matches('#').trim()));
        } else if let Some(point) = bullet_item(line) {
            if let Some(section) = sections.last_mut() {
                section.points.push(point.to_string());
            }
        }
    }

    if sections.is_empty() {
        sections = vec![
            OutlineSection::new("Introduction")
                .with_point("Introduce the topic")
                .with_point("Establish relevance"),
            OutlineSection::new("Main Content")
                .with_point("Key point 1")
                .with_point("Key point 2")
                .with_point("Key point 3"),
            OutlineSection::new("Conclusion")
                .with_point("Summary")
                .with_point("Call to action"),
        ];
    }

    ContentOutline {
        title: title.unwrap_or_else(|| "Content Outline".to_string()),
        hook: hook.unwrap_or_else(|| "Engaging opening to capture reader attention.".to_string()),
        sections,
        conclusion_points: vec!["Key takeaway from the content".to_string()],
        cta: Some("Take the next step based on what you learned.".to_string()),
    }
}

#[async_trait]
impl Stage for PlannerAgent {
    fn name(&self) -> &str {
        "plan"
    }

    fn status(&self) -> JobStatus {
        JobStatus::Planning
    }

    async fn run(&self, job: &ContentJob) -> Result<StageOutput, StageError> {
        let text = complete_text(self.client.as_ref(), &self.config, SYSTEM_PROMPT, Self::prompt(job)).await?;
        let outline = parse_outline(&text);
        debug!(title = %outline.title, sections = outline.sections.len(), "Parsed outline");
        Ok(StageOutput::outline(outline))
    }
}
