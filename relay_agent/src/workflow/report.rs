//! Run results.

use crate::workflow::state::WorkflowStatus;
use chrono::{DateTime, Utc};
use relay_core::{ExecutionStep, RunContext};
use serde::{Deserialize, Serialize};

/// Final status of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
}

/// Why a successful run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Every planned step ran
    AllStepsCompleted,
    /// The selector found no unit for the next subtask
    NoUnitSelected,
    /// Decomposition produced no subtasks
    NoSubtasks,
}

/// Output of a successful run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    /// Result of the last step, if any ran
    pub final_output: Option<String>,
    /// Markdown recap of every step
    pub summary: String,
    /// Steps in execution order
    pub steps: Vec<ExecutionStep>,
    /// Run context at completion
    pub context: RunContext,
    pub termination: Termination,
}

impl RunOutput {
    pub fn new(steps: Vec<ExecutionStep>, context: RunContext, termination: Termination) -> Self {
        Self {
            final_output: steps.last().map(|step| step.result.clone()),
            summary: aggregate(&steps),
            steps,
            context,
            termination,
        }
    }
}

/// Result returned by [`WorkflowEngine::run`](crate::workflow::WorkflowEngine::run).
///
/// Serialises as `{status, result | error, steps, duration, rollback}`;
/// `rollback` is present only for failed runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<RunOutput>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    /// Steps reached by the run
    pub steps: usize,
    /// Wall-clock duration in seconds
    pub duration: f64,
    /// Whether every unit reset cleanly during rollback
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rollback: Option<bool>,
}

impl RunReport {
    pub fn success(output: RunOutput, duration: f64) -> Self {
        Self {
            status: RunStatus::Success,
            steps: output.steps.len(),
            result: Some(output),
            error: None,
            duration,
            rollback: None,
        }
    }

    pub fn failed(error: String, steps: usize, duration: f64, rollback: bool) -> Self {
        Self {
            status: RunStatus::Failed,
            result: None,
            error: Some(error),
            steps,
            duration,
            rollback: Some(rollback),
        }
    }

    /// A run that could not start; no rollback was attempted.
    pub fn rejected(error: String) -> Self {
        Self {
            status: RunStatus::Failed,
            result: None,
            error: Some(error),
            steps: 0,
            duration: 0.0,
            rollback: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// One entry in a workflow's invocation history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub request: String,
    /// Workflow status the invocation ended in
    pub status: WorkflowStatus,
    pub error: Option<String>,
    /// Steps reached
    pub step: usize,
    pub timestamp: DateTime<Utc>,
}

/// Markdown recap of a run's steps.
pub fn aggregate(steps: &[ExecutionStep]) -> String {
    if steps.is_empty() {
        return "No results to aggregate".to_string();
    }

    let mut out = String::from("## Task Execution Summary\n\n");
    for step in steps {
        out.push_str(&format!("### Step {}: {}\n", step.index, step.task));
        out.push_str(&format!("**Agent**: {}\n", step.unit));
        out.push_str(&format!("**Result**: {}\n\n", step.result));
    }
    out.push_str(&format!("**Total Steps Completed**: {}", steps.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(index: usize, unit: &str, result: &str) -> ExecutionStep {
        ExecutionStep {
            index,
            task: format!("task {}", index),
            unit: unit.to_string(),
            result: result.to_string(),
            recovered: false,
            degraded: false,
            attempts: 1,
        }
    }

    #[test]
    fn test_aggregate_empty() {
        assert_eq!(aggregate(&[]), "No results to aggregate");
    }

    #[test]
    fn test_aggregate_markdown() {
        let summary = aggregate(&[step(1, "analyst", "A"), step(2, "writer", "B")]);
        assert!(summary.starts_with("## Task Execution Summary\n\n### Step 1: task 1\n**Agent**: analyst\n"));
        assert!(summary.contains("**Result**: B\n\n"));
        assert!(summary.ends_with("**Total Steps Completed**: 2"));
    }

    #[test]
    fn test_report_serialisation_shape() {
        let output = RunOutput::new(vec![step(1, "analyst", "A")], RunContext::new(), Termination::AllStepsCompleted);
        let json = serde_json::to_value(RunReport::success(output, 0.5)).unwrap();

        assert_eq!(json["status"], "success");
        assert_eq!(json["steps"], 1);
        assert_eq!(json["result"]["final_output"], "A");
        assert_eq!(json["result"]["termination"], "all_steps_completed");
        assert!(json.get("rollback").is_none());

        let failed = serde_json::to_value(RunReport::failed("boom".into(), 2, 1.0, true)).unwrap();
        assert_eq!(failed["status"], "failed");
        assert_eq!(failed["error"], "boom");
        assert_eq!(failed["rollback"], true);
        assert!(failed.get("result").is_none());
    }
}
