//! Request decomposition into ordered subtasks.

use crate::prompts::{render, TASK_DECOMPOSITION_PROMPT};
use regex::Regex;
use relay_core::{preview, AgentDescriptor, GenerationError, TextGenerator};
use std::sync::{Arc, OnceLock};

fn numbered_line() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+\.\s+(.+)$").expect("valid numbered-line pattern"))
}

/// Extracts `N. text` lines from a response, in document order.
///
/// Headers, notes and any other non-matching lines are discarded.
///
/// # Example
///
/// ```
/// use relay_agent::workflow::decompose::parse_subtasks;
///
/// let tasks = parse_subtasks("1. Load data\n2. Analyze data\nNotes: ignore");
/// assert_eq!(tasks, vec!["Load data", "Analyze data"]);
/// ```
pub fn parse_subtasks(response: &str) -> Vec<String> {
    response
        .lines()
        .filter_map(|line| numbered_line().captures(line.trim()))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Turns a request into subtasks with one text-generation call.
#[derive(Clone)]
pub struct TaskDecomposer {
    generator: Arc<dyn TextGenerator>,
}

impl TaskDecomposer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Renders the decomposition prompt for `request`.
    pub fn prompt(request: &str, units: &[AgentDescriptor]) -> String {
        let available = units
            .iter()
            .map(|unit| format!("{}: {}", unit.name(), unit.description()))
            .collect::<Vec<_>>()
            .join(", ");

        render(
            TASK_DECOMPOSITION_PROMPT,
            &[("user_request", request), ("available_agents", available.as_str())],
        )
    }

    /// Decomposes `request`. An empty list means no subtasks could be
    /// identified. The call is not retried.
    pub async fn decompose(&self, request: &str, units: &[AgentDescriptor]) -> Result<Vec<String>, GenerationError> {
        let response = self.generator.generate(&Self::prompt(request, units)).await?;
        let subtasks = parse_subtasks(&response.content);

        tracing::info!(request = %preview(request, 50), subtasks = subtasks.len(), "decomposed request");
        Ok(subtasks)
    }
}
