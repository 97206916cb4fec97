//! Prompt templates for the stock task units.
//!
//! Templates use `{name}` placeholders filled by [`render`].

use regex::{Captures, Regex};
use std::sync::OnceLock;

pub const GENERAL_TASK_PROMPT: &str = r#"You are a task execution agent. Complete the following task efficiently.

Task: {task}
Context: {context}
Requirements: {requirements}

Guidelines:
- Focus on the specific task
- Be accurate and thorough
- Provide clear, actionable output

Example:
Task: "Calculate monthly revenue growth rate"
Context: "Working with Q1 2024 financial data"
Requirements: "Show percentage change month-over-month"
Output: "January: $100K, February: $110K (+10%), March: $125K (+13.6%)"

Your response:"#;

pub const SPECIALIZED_TASK_PROMPT: &str = r#"You are a specialized {domain} agent. Use your domain expertise to complete this task.

Domain: {domain}
Task: {task}
Context: {context}
Domain-Specific Requirements: {domain_requirements}

Apply your specialized knowledge to:
- Use domain best practices
- Apply relevant methodologies
- Consider domain constraints

Begin your specialized analysis:"#;

/// Requirements line used when a general task carries none of its own.
pub const DEFAULT_REQUIREMENTS: &str = "Execute the task accurately and provide clear output";

/// Placeholder text for an empty context.
pub const NO_CONTEXT: &str = "No previous context";

/// Requirements text for a specialisation domain.
pub fn domain_requirements(domain: &str) -> &'static str {
    match domain {
        "data_analysis" => {
            "Provide statistical insights, identify patterns, and suggest actionable recommendations"
        }
        "code_review" => "Check for bugs, suggest improvements, and ensure best practices",
        "research" => "Provide comprehensive analysis with sources and evidence",
        "planning" => "Create structured plans with timelines and dependencies",
        _ => "Complete the task according to domain best practices",
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("valid placeholder pattern"))
}

/// Fills `{name}` placeholders in a single pass.
///
/// Placeholders without a matching variable are kept verbatim, and
/// substituted values are never rescanned.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    placeholder_pattern()
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
