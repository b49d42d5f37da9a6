//! Ready-made requests, outputs and stage sets.

use std::sync::Arc;

use super::ScriptedStage;
use crate::core::{
    ContentOutline, ContentRequest, ContentType, JobStatus, OutlineSection, ResearchNotes,
    StageOutput,
};
use crate::stages::Stage;

/// The request used across the pipeline tests.
#[must_use]
pub fn sample_request() -> ContentRequest {
    ContentRequest::new("AI adoption")
        .with_content_type(ContentType::BlogPost)
        .with_word_count(500)
        .with_keywords(["ai", "adoption"])
}

/// Research output with a couple of findings.
#[must_use]
pub fn sample_research() -> ResearchNotes {
    ResearchNotes {
        key_facts: vec!["Most enterprises now pilot generative AI".to_string()],
        statistics: vec!["Adoption doubled year over year".to_string()],
        sources: vec!["Industry survey".to_string()],
        ..ResearchNotes::default()
    }
}

/// A small outline.
#[must_use]
pub fn sample_outline() -> ContentOutline {
    ContentOutline::new("Why AI adoption is accelerating")
        .with_section(OutlineSection::new("Where teams start").with_point("Pilots"))
        .with_section(OutlineSection::new("What slows them down").with_point("Data quality"))
}

/// The four standard stages, each succeeding at once with plausible output.
#[must_use]
pub fn standard_stages() -> [Arc<ScriptedStage>; 4] {
    [
        Arc::new(
            ScriptedStage::new("research", JobStatus::Researching)
                .with_output(StageOutput::research(sample_research())),
        ),
        Arc::new(
            ScriptedStage::new("plan", JobStatus::Planning)
                .with_output(StageOutput::outline(sample_outline())),
        ),
        Arc::new(
            ScriptedStage::new("write", JobStatus::Writing)
                .with_output(StageOutput::draft("AI adoption is accelerating. Draft.")),
        ),
        Arc::new(
            ScriptedStage::new("edit", JobStatus::Editing)
                .with_output(StageOutput::content("AI adoption is accelerating.")),
        ),
    ]
}

/// Upcasts scripted stages for the builder.
#[must_use]
pub fn as_stages(stages: &[Arc<ScriptedStage>]) -> Vec<Arc<dyn Stage>> {
    stages
        .iter()
        .map(|stage| stage.clone() as Arc<dyn Stage>)
        .collect()
}
