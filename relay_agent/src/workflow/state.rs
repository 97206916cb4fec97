//! Workflow execution state machine.
//!
//! ```text
//! idle ──> running ──> completed ──┐
//!            │  ^                  │
//!            v  └──────────────────┘
//!          failed ──> rolled_back ──> running
//! ```
//!
//! `reset` returns any state to `idle`.

use crate::workflow::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Not yet invoked, or reset
    Idle,
    /// A run is in progress
    Running,
    /// The last run finished without an unrecovered fault
    Completed,
    /// The last run hit an unrecovered fault
    Failed,
    /// Rollback ran after a failure
    RolledBack,
}

impl WorkflowStatus {
    /// Every status, in declaration order.
    pub const ALL: [WorkflowStatus; 5] = [
        WorkflowStatus::Idle,
        WorkflowStatus::Running,
        WorkflowStatus::Completed,
        WorkflowStatus::Failed,
        WorkflowStatus::RolledBack,
    ];

    /// Returns `true` when the transition table allows `self -> next`.
    pub fn can_transition_to(self, next: WorkflowStatus) -> bool {
        use WorkflowStatus::*;

        matches!(
            (self, next),
            (_, Idle)
                | (Idle, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Failed, RolledBack)
                | (Completed, Running)
                | (RolledBack, Running)
        )
    }

    /// Returns `next` if the transition is allowed.
    pub fn transition_to(self, next: WorkflowStatus) -> Result<WorkflowStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(EngineError::InvalidTransition { from: self, to: next })
        }
    }

    /// Returns `true` for statuses that end a run.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::RolledBack)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStatus::Idle => "idle",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
