//! Stage output and the structured documents stages produce.

use serde::{Deserialize, Serialize};

/// Findings gathered by the research stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchNotes {
    /// Main factual points.
    #[serde(default)]
    pub key_facts: Vec<String>,
    /// Numbers and data points.
    #[serde(default)]
    pub statistics: Vec<String>,
    /// Quotes from authorities.
    #[serde(default)]
    pub quotes: Vec<String>,
    /// Where the information came from.
    #[serde(default)]
    pub sources: Vec<String>,
    /// What others are saying about the topic.
    #[serde(default)]
    pub competitor_insights: Vec<String>,
}

impl ResearchNotes {
    /// Returns true when no finding was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key_facts.is_empty()
            && self.statistics.is_empty()
            && self.quotes.is_empty()
            && self.sources.is_empty()
            && self.competitor_insights.is_empty()
    }

    /// Total number of findings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.key_facts.len()
            + self.statistics.len()
            + self.quotes.len()
            + self.sources.len()
            + self.competitor_insights.len()
    }
}

/// One section of a content outline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineSection {
    /// Section heading.
    pub heading: String,
    /// Points to cover.
    #[serde(default)]
    pub points: Vec<String>,
}

impl OutlineSection {
    /// Creates a section with no points.
    #[must_use]
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            points: Vec::new(),
        }
    }

    /// Appends a point.
    #[must_use]
    pub fn with_point(mut self, point: impl Into<String>) -> Self {
        self.points.push(point.into());
        self
    }
}

/// Structure produced by the planning stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentOutline {
    /// Working title.
    pub title: String,
    /// Opening hook.
    #[serde(default)]
    pub hook: String,
    /// Body sections.
    #[serde(default)]
    pub sections: Vec<OutlineSection>,
    /// Points for the conclusion.
    #[serde(default)]
    pub conclusion_points: Vec<String>,
    /// Call to action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<String>,
}

impl ContentOutline {
    /// Creates an outline with only a title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Appends a section.
    #[must_use]
    pub fn with_section(mut self, section: OutlineSection) -> Self {
        self.sections.push(section);
        self
    }
}

/// The partial job update a stage returns.
///
/// Only the fields a stage sets are merged into the job; everything else
/// produced by earlier stages is left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutput {
    /// Research findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_notes: Option<ResearchNotes>,
    /// Content outline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<ContentOutline>,
    /// First draft.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_content: Option<String>,
    /// Final, edited content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_content: Option<String>,
}

impl StageOutput {
    /// Creates an output that changes nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates an output carrying research notes.
    #[must_use]
    pub fn research(notes: ResearchNotes) -> Self {
        Self::default().with_research(notes)
    }

    /// Creates an output carrying an outline.
    #[must_use]
    pub fn outline(outline: ContentOutline) -> Self {
        Self::default().with_outline(outline)
    }

    /// Creates an output carrying a draft.
    #[must_use]
    pub fn draft(draft: impl Into<String>) -> Self {
        Self::default().with_draft(draft)
    }

    /// Creates an output carrying final content.
    #[must_use]
    pub fn content(content: impl Into<String>) -> Self {
        Self::default().with_content(content)
    }

    /// Sets research notes.
    #[must_use]
    pub fn with_research(mut self, notes: ResearchNotes) -> Self {
        self.research_notes = Some(notes);
        self
    }

    /// Sets the outline.
    #[must_use]
    pub fn with_outline(mut self, outline: ContentOutline) -> Self {
        self.outline = Some(outline);
        self
    }

    /// Sets the draft.
    #[must_use]
    pub fn with_draft(mut self, draft: impl Into<String>) -> Self {
        self.draft_content = Some(draft.into());
        self
    }

    /// Sets the final content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.generated_content = Some(content.into());
        self
    }

    /// Returns true if the output sets no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.research_notes.is_none()
            && self.outline.is_none()
            && self.draft_content.is_none()
            && self.generated_content.is_none()
    }

    /// Names of the fields this output sets, for logging.
    #[must_use]
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.research_notes.is_some() {
            names.push("research_notes");
        }
        if self.outline.is_some() {
            names.push("outline");
        }
        if self.draft_content.is_some() {
            names.push("draft_content");
        }
        if self.generated_content.is_some() {
            names.push("generated_content");
        }
        names
    }
}
