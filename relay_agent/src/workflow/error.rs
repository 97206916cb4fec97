//! Workflow engine errors.

use crate::workflow::state::WorkflowStatus;
use relay_core::{GenerationError, UnitError};
use std::time::Duration;

/// Hard faults that end a run in `failed`.
///
/// Soft unit failures never surface here: the retry loop absorbs them
/// into a degraded step result.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// The engine was built without any units
    #[error("No units configured for workflow")]
    NoUnits,

    /// The step ceiling was reached
    #[error("Exceeded maximum steps: {max_steps}")]
    MaxStepsExceeded { max_steps: usize },

    /// The decomposition call failed
    #[error("Task decomposition failed: {0}")]
    Decomposition(#[source] GenerationError),

    /// The unit-selection call failed
    #[error("Unit selection failed: {0}")]
    Selection(#[source] GenerationError),

    /// A unit raised a hard failure and inline recovery did not help
    #[error("Step {step} ({unit}) failed: {source}")]
    UnitFault {
        step: usize,
        unit: String,
        #[source]
        source: UnitError,
    },

    /// The run exceeded its deadline
    #[error("Workflow exceeded timeout limit of {timeout:?}")]
    Timeout { timeout: Duration },

    /// A state change not allowed by the transition table
    #[error("Invalid workflow transition: {from} -> {to}")]
    InvalidTransition { from: WorkflowStatus, to: WorkflowStatus },

    /// A checkpoint failed its integrity check
    #[error("Checkpoint {sequence} is corrupted: checksum mismatch")]
    CheckpointCorrupted { sequence: u64 },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
