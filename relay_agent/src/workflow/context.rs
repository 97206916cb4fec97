//! Run-context maintenance and placeholder resolution.

use regex::{Captures, Regex};
use relay_core::{ExecutionStep, RunContext};
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{step_(\d+)_output\}").expect("valid step placeholder pattern"))
}

/// Returns `true` if `text` contains any `{step_N_output}` token.
pub fn has_placeholders(text: &str) -> bool {
    placeholder_pattern().is_match(text)
}

/// Task text after placeholder substitution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Text with every in-range token replaced
    pub text: String,
    /// Tokens left verbatim because they referenced a missing step
    pub unresolved: Vec<String>,
}

/// Owns the `RunContext` mutations of one run.
pub struct ContextPropagator;

impl ContextPropagator {
    /// Refreshes the summary entry before the step at `position`
    /// (0-based). The first step starts without a summary; later steps
    /// get a recap of every prior step, replacing any previous value.
    pub fn prepare(context: &mut RunContext, position: usize, steps: &[ExecutionStep]) {
        if position == 0 || steps.is_empty() {
            context.remove(RunContext::SUMMARY_KEY);
        } else {
            context.insert(RunContext::SUMMARY_KEY, Self::recap(steps));
        }
    }

    /// Enumerated recap of prior steps.
    pub fn recap(steps: &[ExecutionStep]) -> String {
        steps
            .iter()
            .map(|step| {
                format!(
                    "Step {} ({}): {}\nResult: {}",
                    step.index, step.unit, step.task, step.result
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Replaces `{step_N_output}` tokens with the result of step N.
    ///
    /// Tokens with N outside `1..=steps.len()` stay as they are and are
    /// reported in [`Resolution::unresolved`].
    pub fn resolve(text: &str, steps: &[ExecutionStep]) -> Resolution {
        let mut unresolved = Vec::new();

        let resolved = placeholder_pattern().replace_all(text, |caps: &Captures| {
            let index = caps[1].parse::<usize>().ok().filter(|n| (1..=steps.len()).contains(n));
            match index {
                Some(n) => steps[n - 1].result.clone(),
                None => {
                    let token = caps[0].to_string();
                    if !unresolved.contains(&token) {
                        unresolved.push(token.clone());
                    }
                    token
                }
            }
        });

        for token in &unresolved {
            tracing::warn!(placeholder = %token, available = steps.len(), "placeholder references a step that has not run");
        }

        Resolution {
            text: resolved.into_owned(),
            unresolved,
        }
    }

    /// Records a step's result under its unit's output key.
    pub fn record(context: &mut RunContext, step: &ExecutionStep) {
        context.set_unit_output(&step.unit, step.result.clone());
    }
}
