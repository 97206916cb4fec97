//! Workflow orchestration for multi-unit runs.
//!
//! The workflow module routes one request through a sequence of units:
//! - Decomposes the request into ordered subtasks
//! - Selects a unit per subtask, or runs a fixed pipeline
//! - Propagates results between steps through the run context
//! - Retries failing steps and recovers or rolls back on hard faults
//!
//! # Architecture
//!
//! - [`TaskDecomposer`]: request to numbered subtask list
//! - [`AgentSelector`]: subtask to unit name, or "none"
//! - [`ContextPropagator`]: summary upkeep and `{step_N_output}` resolution
//! - [`RetryExecutor`]: bounded, fixed-delay retry of one step
//! - [`CheckpointStore`]: the last three post-step snapshots
//! - [`WorkflowEngine`]: the run state machine tying these together
//!
//! # Example
//!
//! ```ignore
//! use relay_agent::workflow::WorkflowEngine;
//!
//! let mut engine = WorkflowEngine::router("router", units, generator);
//! let report = engine.run("Analyze sales data and write a report").await;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```

pub mod builder;
pub mod checkpoint;
pub mod context;
pub mod decompose;
pub mod engine;
pub mod error;
pub mod report;
pub mod retry;
pub mod select;
pub mod state;
pub mod timeout;

pub use builder::{build_workflow, BuildError};
pub use checkpoint::{Checkpoint, CheckpointId, CheckpointStore, MAX_CHECKPOINTS};
pub use context::{ContextPropagator, Resolution};
pub use decompose::{parse_subtasks, TaskDecomposer};
pub use engine::{EngineConfig, WorkflowEngine, WorkflowRun};
pub use error::{EngineError, Result};
pub use report::{aggregate, RunOutput, RunRecord, RunReport, RunStatus, Termination};
pub use retry::{AttemptOutcome, FailureKind, RetryExecutor, RetryOutcome, RetryPolicy};
pub use select::{parse_selection, AgentSelector, Selection};
pub use state::WorkflowStatus;
pub use timeout::RunTimeout;
