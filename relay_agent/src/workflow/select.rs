//! Per-subtask unit selection.

use crate::prompts::{render, AGENT_SELECTION_PROMPT};
use regex::Regex;
use relay_core::{AgentDescriptor, GenerationError, TextGenerator};
use std::sync::{Arc, OnceLock};

fn no_agent_phrase() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)agent:\s*none\b|\bno\s+(suitable\s+)?agent\b").expect("valid no-agent pattern")
    })
}

/// Result of selecting a unit for one subtask.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    /// The named unit should run the subtask
    Unit(String),
    /// The response explicitly said no unit is needed
    NoAgent,
    /// The response named none of the available units
    Unmatched,
}

impl Selection {
    /// Both `NoAgent` and `Unmatched` stop the run.
    pub fn is_none(&self) -> bool {
        !matches!(self, Selection::Unit(_))
    }

    pub fn unit(&self) -> Option<&str> {
        match self {
            Selection::Unit(name) => Some(name),
            _ => None,
        }
    }
}

/// Interprets a selection response against the available units.
///
/// An explicit "no agent" phrase wins. Otherwise the first unit, in the
/// given order, whose name occurs in the response (case-insensitive) is
/// selected.
pub fn parse_selection(response: &str, units: &[AgentDescriptor]) -> Selection {
    if no_agent_phrase().is_match(response) {
        return Selection::NoAgent;
    }

    let lowered = response.to_lowercase();
    units
        .iter()
        .find(|unit| lowered.contains(&unit.name().to_lowercase()))
        .map(|unit| Selection::Unit(unit.name().to_string()))
        .unwrap_or(Selection::Unmatched)
}

/// Picks a unit for a subtask with one text-generation call.
#[derive(Clone)]
pub struct AgentSelector {
    generator: Arc<dyn TextGenerator>,
}

impl AgentSelector {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn prompt(task: &str, units: &[AgentDescriptor]) -> String {
        let description = units
            .iter()
            .map(|unit| {
                let capabilities: Vec<&str> = unit.capabilities().iter().map(String::as_str).collect();
                if capabilities.is_empty() {
                    format!("- {}: {}", unit.name(), unit.description())
                } else {
                    format!(
                        "- {}: {} (capabilities: {})",
                        unit.name(),
                        unit.description(),
                        capabilities.join(", ")
                    )
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        render(AGENT_SELECTION_PROMPT, &[("task", task), ("agents_description", description.as_str())])
    }

    /// Selects a unit for `task`. The call is not retried.
    pub async fn select(&self, task: &str, units: &[AgentDescriptor]) -> Result<Selection, GenerationError> {
        let response = self.generator.generate(&Self::prompt(task, units)).await?;
        let selection = parse_selection(&response.content, units);

        match &selection {
            Selection::Unit(name) => tracing::info!(unit = %name, "selected unit"),
            Selection::NoAgent => tracing::info!("selector reported no further work"),
            Selection::Unmatched => {
                tracing::warn!(response = %response.content.trim(), "selection named no available unit")
            }
        }
        Ok(selection)
    }
}
