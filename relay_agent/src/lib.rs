//! RelayKit agent layer - request routing across task units.
//!
//! This crate drives a request through a sequence of units:
//!
//! - Decomposition: split the request into ordered subtasks
//! - Selection: pick a capable unit per subtask
//! - Propagation: carry results forward as context and placeholders
//! - Recovery: retry, recover inline, checkpoint and roll back
//!
//! The [`workflow`] module holds the engine; [`cli`] is the `relay`
//! front end.

pub mod cli;
pub mod prompts;
pub mod workflow;

pub use workflow::{
    build_workflow, AgentSelector, BuildError, CheckpointStore, ContextPropagator, EngineConfig, EngineError,
    RetryExecutor, RetryPolicy, RunOutput, RunReport, RunStatus, RunTimeout, Selection, TaskDecomposer,
    Termination, WorkflowEngine, WorkflowStatus,
};
