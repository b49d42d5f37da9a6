//! LLM-backed agents for the standard content stages.
//!
//! Each agent implements [`Stage`] for one step of the pipeline. They share
//! the [`LlmClient`] seam so tests and alternative providers can stand in
//! for the network client.

#[cfg(feature = "anthropic")]
mod anthropic;
mod client;
mod editor;
mod planner;
mod research;
mod writer;

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicClient, AnthropicConfig, DEFAULT_BASE_URL};
pub use client::{AgentConfig, LlmClient, LlmRequest, LlmResponse, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
#[cfg(test)]
pub(crate) use client::MockLlmClient;
pub use editor::EditorAgent;
pub use planner::{parse_outline, PlannerAgent};
pub use research::{parse_research, ResearchAgent};
pub use writer::WriterAgent;

use crate::stages::{Stage, StageKind};
use std::sync::Arc;

/// Builds the agent for one stage kind.
#[must_use]
pub fn stage_for(kind: StageKind, client: Arc<dyn LlmClient>, config: AgentConfig) -> Arc<dyn Stage> {
    match kind {
        StageKind::Research => Arc::new(ResearchAgent::new(client, config)),
        StageKind::Plan => Arc::new(PlannerAgent::new(client, config)),
        StageKind::Write => Arc::new(WriterAgent::new(client, config)),
        StageKind::Edit => Arc::new(EditorAgent::new(client, config)),
    }
}

/// Builds agents for the given kinds, in order.
#[must_use]
pub fn stages_for(kinds: &[StageKind], client: &Arc<dyn LlmClient>, config: &AgentConfig) -> Vec<Arc<dyn Stage>> {
    kinds
        .iter()
        .map(|kind| stage_for(*kind, Arc::clone(client), config.clone()))
        .collect()
}

/// Research, plan, write and edit, sharing one client.
#[must_use]
pub fn default_stages(client: &Arc<dyn LlmClient>, config: &AgentConfig) -> Vec<Arc<dyn Stage>> {
    stages_for(&StageKind::STANDARD, client, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JobStatus;

    #[test]
    fn test_default_stages_order() {
        let client: Arc<dyn LlmClient> = Arc::new(client::MockLlmClient::new());
        let stages = default_stages(&client, &AgentConfig::default());
        let names: Vec<&str> = stages.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["research", "plan", "write", "edit"]);
        assert_eq!(stages[3].status(), JobStatus::Editing);
    }

    #[test]
    fn test_stages_for_subset() {
        let client: Arc<dyn LlmClient> = Arc::new(client::MockLlmClient::new());
        let stages = stages_for(&[StageKind::Research, StageKind::Plan], &client, &AgentConfig::default());
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].name(), "plan");
    }
}
