//! Unit contract and execution bookkeeping.
//!
//! A [`Unit`] is anything that can take a task and produce text. The
//! orchestrator never calls a unit directly: it goes through a
//! [`UnitHandle`], which owns the unit's execution state, internal
//! history and memory, and implements the error-handling execute path.

use crate::error::UnitError;
use crate::memory::{MemoryKind, UnitMemory};
use crate::types::{AgentDescriptor, RunContext, UnitState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A task-executing component.
#[async_trait]
pub trait Unit: Send + Sync {
    /// Static description (name, capabilities, description).
    fn descriptor(&self) -> &AgentDescriptor;

    fn name(&self) -> &str {
        self.descriptor().name()
    }

    fn description(&self) -> &str {
        self.descriptor().description()
    }

    fn capabilities(&self) -> &BTreeSet<String> {
        self.descriptor().capabilities()
    }

    /// Checks the task before execution. Returning `false` aborts the
    /// invocation with [`UnitError::InvalidInput`].
    fn validate(&self, task: &str, context: &RunContext) -> bool;

    /// Executes the task and returns raw output.
    async fn execute(&mut self, task: &str, context: &RunContext) -> Result<String, UnitError>;

    /// Formats raw output for the next consumer.
    fn format_output(&self, raw: String) -> String {
        raw
    }

    /// Clears unit-local state during recovery or rollback.
    fn reset(&mut self) -> Result<(), UnitError> {
        Ok(())
    }
}

/// One entry in a unit's internal history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitExecution {
    /// Task text as received
    pub task: String,
    /// Final state of the invocation (`Completed` or `Failed`)
    pub state: UnitState,
    /// Formatted output on success
    pub output: Option<String>,
    /// Error message on failure
    pub error: Option<String>,
    /// When the invocation finished
    pub timestamp: DateTime<Utc>,
}

/// Owner of a unit and its mutable execution state.
pub struct UnitHandle {
    unit: Box<dyn Unit>,
    state: UnitState,
    history: Vec<UnitExecution>,
    memory: UnitMemory,
}

impl UnitHandle {
    /// Wraps a unit in the idle state with empty history.
    pub fn new(unit: Box<dyn Unit>) -> Self {
        Self {
            unit,
            state: UnitState::Idle,
            history: Vec::new(),
            memory: UnitMemory::new(),
        }
    }

    pub fn descriptor(&self) -> &AgentDescriptor {
        self.unit.descriptor()
    }

    pub fn name(&self) -> &str {
        self.unit.name()
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    /// Overrides the execution state.
    pub fn set_state(&mut self, state: UnitState) {
        if self.state != state {
            tracing::debug!(unit = %self.unit.name(), from = %self.state, to = %state, "unit state changed");
        }
        self.state = state;
    }

    pub fn history(&self) -> &[UnitExecution] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Exchanges remembered by this unit. Every successful invocation
    /// appends its task and output under [`MemoryKind::Agent`].
    pub fn memory(&self) -> &UnitMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut UnitMemory {
        &mut self.memory
    }

    /// Runs the task through validation, execution and formatting.
    ///
    /// On success the formatted output is recorded in history and memory
    /// and the state becomes `Completed`. On failure the error is recorded, the state becomes
    /// `Failed`, and the error is returned to the caller.
    pub async fn invoke(&mut self, task: &str, context: &RunContext) -> Result<String, UnitError> {
        self.set_state(UnitState::Running);

        let outcome = self.run_checked(task, context).await;
        match outcome {
            Ok(output) => {
                self.memory.store(MemoryKind::Agent, task, output.as_str());
                self.record(task, UnitState::Completed, Some(output.clone()), None);
                self.set_state(UnitState::Completed);
                tracing::info!(unit = %self.unit.name(), "task completed");
                Ok(output)
            }
            Err(err) => {
                tracing::error!(unit = %self.unit.name(), error = %err, "task failed");
                self.record(task, UnitState::Failed, None, Some(err.to_string()));
                self.set_state(UnitState::Failed);
                Err(err)
            }
        }
    }

    async fn run_checked(&mut self, task: &str, context: &RunContext) -> Result<String, UnitError> {
        if !self.unit.validate(task, context) {
            return Err(UnitError::InvalidInput(format!(
                "{} rejected task: {}",
                self.unit.name(),
                preview(task, 50)
            )));
        }

        tracing::info!(unit = %self.unit.name(), task = %preview(task, 50), "starting task");
        let raw = self.unit.execute(task, context).await?;
        Ok(self.unit.format_output(raw))
    }

    fn record(&mut self, task: &str, state: UnitState, output: Option<String>, error: Option<String>) {
        self.history.push(UnitExecution {
            task: task.to_string(),
            state,
            output,
            error,
            timestamp: Utc::now(),
        });
    }

    /// Prepares the unit for an immediate retry of a failed task.
    ///
    /// Returns to idle, discards the most recent history entry and runs
    /// the unit's reset hook.
    pub fn recover(&mut self) -> Result<(), UnitError> {
        self.set_state(UnitState::Idle);
        self.history.pop();
        self.unit.reset()
    }

    /// Forces the unit back to idle, running its reset hook.
    ///
    /// The state is idle afterwards even if the hook fails.
    pub fn force_idle(&mut self) -> Result<(), UnitError> {
        self.set_state(UnitState::Idle);
        self.unit.reset()
    }
}

impl fmt::Debug for UnitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitHandle")
            .field("name", &self.unit.name())
            .field("state", &self.state)
            .field("history", &self.history.len())
            .field("memory_empty", &self.memory.is_empty())
            .finish()
    }
}

impl fmt::Display for UnitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.unit.name(), self.state)
    }
}

/// Truncates `text` to at most `max_chars` characters for log lines.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GenerationError, MemoryError};
    use crate::generate::{Generation, TextGenerator};
    use crate::memory::{Exchange, MessageRole};
    use std::sync::Mutex;

    struct EchoUnit {
        descriptor: AgentDescriptor,
        fail_with: Option<UnitError>,
        resets: usize,
    }

    impl EchoUnit {
        fn new() -> Self {
            Self {
                descriptor: AgentDescriptor::new("echo", ["general_tasks"], "Echoes tasks"),
                fail_with: None,
                resets: 0,
            }
        }
    }

    #[async_trait]
    impl Unit for EchoUnit {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.descriptor
        }

        fn validate(&self, task: &str, _context: &RunContext) -> bool {
            !task.trim().is_empty()
        }

        async fn execute(&mut self, task: &str, _context: &RunContext) -> Result<String, UnitError> {
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(format!(" {} ", task)),
            }
        }

        fn format_output(&self, raw: String) -> String {
            raw.trim().to_uppercase()
        }

        fn reset(&mut self) -> Result<(), UnitError> {
            self.resets += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_invoke_success_records_history() {
        let mut handle = UnitHandle::new(Box::new(EchoUnit::new()));
        let output = handle.invoke("hello", &RunContext::new()).await.unwrap();

        assert_eq!(output, "HELLO");
        assert_eq!(handle.state(), UnitState::Completed);
        assert_eq!(handle.history().len(), 1);
        assert_eq!(handle.history()[0].output.as_deref(), Some("HELLO"));
    }

    #[tokio::test]
    async fn test_invoke_rejects_invalid_input() {
        let mut handle = UnitHandle::new(Box::new(EchoUnit::new()));
        let err = handle.invoke("   ", &RunContext::new()).await.unwrap_err();

        assert!(matches!(err, UnitError::InvalidInput(_)));
        assert_eq!(handle.state(), UnitState::Failed);
        assert_eq!(handle.history()[0].state, UnitState::Failed);
    }

    #[tokio::test]
    async fn test_invoke_failure_sets_failed_state() {
        let mut unit = EchoUnit::new();
        unit.fail_with = Some(UnitError::Failed("boom".into()));
        let mut handle = UnitHandle::new(Box::new(unit));

        let err = handle.invoke("task", &RunContext::new()).await.unwrap_err();
        assert_eq!(err, UnitError::Failed("boom".into()));
        assert_eq!(handle.state(), UnitState::Failed);
        assert_eq!(handle.history()[0].error.as_deref(), Some("Execution failed: boom"));
    }

    #[tokio::test]
    async fn test_recover_discards_latest_history_entry() {
        let mut handle = UnitHandle::new(Box::new(EchoUnit::new()));
        handle.invoke("first", &RunContext::new()).await.unwrap();
        handle.invoke("second", &RunContext::new()).await.unwrap();

        handle.recover().unwrap();
        assert_eq!(handle.state(), UnitState::Idle);
        assert_eq!(handle.history().len(), 1);
        assert_eq!(handle.history()[0].task, "first");
    }

    #[test]
    fn test_force_idle_from_failed() {
        let mut handle = UnitHandle::new(Box::new(EchoUnit::new()));
        handle.set_state(UnitState::Failed);

        handle.force_idle().unwrap();
        assert_eq!(handle.state(), UnitState::Idle);
    }

    #[tokio::test]
    async fn test_invoke_stores_agent_memory() {
        let mut handle = UnitHandle::new(Box::new(EchoUnit::new()));
        handle.invoke("load", &RunContext::new()).await.unwrap();
        let _ = handle.invoke("  ", &RunContext::new()).await;
        handle.invoke("report", &RunContext::new()).await.unwrap();

        let messages = handle.memory().retrieve(MemoryKind::Agent, None);
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["load", "LOAD", "report", "REPORT"]);
        assert_eq!(messages[0].role, MessageRole::Input);
        assert_eq!(messages[1].role, MessageRole::Output);
        assert!(handle.memory().retrieve(MemoryKind::Conversation, None).is_empty());
    }

    #[test]
    fn test_memory_last_k_and_window() {
        let mut memory = UnitMemory::new();
        for i in 1..=4 {
            memory.store(MemoryKind::Task, format!("q{}", i), format!("a{}", i));
        }

        let last: Vec<&str> = memory
            .retrieve(MemoryKind::Task, Some(3))
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(last, vec!["a3", "q4", "a4"]);
        assert_eq!(memory.retrieve(MemoryKind::Task, Some(50)).len(), 8);

        let window = memory.window(MemoryKind::Task, 2);
        assert_eq!(
            window,
            vec![
                Exchange { input: "q3".into(), output: "a3".into() },
                Exchange { input: "q4".into(), output: "a4".into() },
            ]
        );
    }

    #[test]
    fn test_memory_update_and_clear() {
        let mut memory = UnitMemory::new();
        memory.store(MemoryKind::Conversation, "hi", "hello");
        memory.store(MemoryKind::Agent, "task", "done");

        memory.update(MemoryKind::Conversation, 1, "hello there").unwrap();
        let updated = &memory.retrieve(MemoryKind::Conversation, None)[1];
        assert_eq!(updated.content, "hello there");
        assert_eq!(updated.role, MessageRole::Output);

        assert!(matches!(
            memory.update(MemoryKind::Conversation, 2, "x"),
            Err(MemoryError::IndexOutOfRange { index: 2, len: 2, .. })
        ));
        assert!(matches!(
            memory.update(MemoryKind::Task, 0, "x"),
            Err(MemoryError::EmptyBuffer(MemoryKind::Task))
        ));

        memory.clear(Some(MemoryKind::Conversation));
        assert!(memory.retrieve(MemoryKind::Conversation, None).is_empty());
        assert_eq!(memory.retrieve(MemoryKind::Agent, None).len(), 2);

        memory.clear(None);
        assert!(memory.is_empty());
    }

    struct SummaryGenerator {
        reply: Option<&'static str>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for SummaryGenerator {
        async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.reply {
                Some(text) => Ok(Generation::text(text)),
                None => Err(GenerationError::Request("offline".into())),
            }
        }

        fn model(&self) -> &str {
            "summary"
        }

        fn provider(&self) -> &str {
            "test"
        }
    }

    #[tokio::test]
    async fn test_memory_compression_through_generator() {
        let generator = SummaryGenerator {
            reply: Some(" Loaded 10 rows, report pending. "),
            prompts: Mutex::new(Vec::new()),
        };
        let mut memory = UnitMemory::new();
        memory.store(MemoryKind::Agent, "Load the sales data", "Loaded 10 rows");

        // Under the limit: nothing to do.
        assert!(!memory.compress(MemoryKind::Agent, &generator, 100).await.unwrap());
        assert!(generator.prompts.lock().unwrap().is_empty());

        assert!(memory.compress(MemoryKind::Agent, &generator, 2).await.unwrap());
        let messages = memory.retrieve(MemoryKind::Agent, None);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::Summary);
        assert_eq!(messages[0].content, "Loaded 10 rows, report pending.");

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("Input: Load the sales data\nOutput: Loaded 10 rows"));
    }

    #[tokio::test]
    async fn test_memory_compression_failure_keeps_buffer() {
        let generator = SummaryGenerator {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        };
        let mut memory = UnitMemory::new();
        memory.store(MemoryKind::Task, "question", "answer");

        let err = memory.compress(MemoryKind::Task, &generator, 0).await.unwrap_err();
        assert!(matches!(err, MemoryError::Compression(_)));
        assert_eq!(memory.retrieve(MemoryKind::Task, None).len(), 2);
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("short", 50), "short");
        assert_eq!(preview("héllo wörld", 5), "héllo...");
    }
}
