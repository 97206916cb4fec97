//! Scripted units and generators shared by the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use relay_core::{AgentDescriptor, Generation, GenerationError, RunContext, TextGenerator, Unit, UnitError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a scripted unit saw on one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub task: String,
    pub summary: Option<String>,
}

/// Observation handle kept by the test after the unit moves into an engine.
#[derive(Clone, Default)]
pub struct Probe {
    calls: Arc<Mutex<Vec<Call>>>,
    resets: Arc<Mutex<usize>>,
}

impl Probe {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tasks(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.task).collect()
    }

    pub fn resets(&self) -> usize {
        *self.resets.lock().unwrap()
    }
}

/// A unit that replays scripted results, then echoes `"<name>: <task>"`.
pub struct ScriptedUnit {
    descriptor: AgentDescriptor,
    script: VecDeque<Result<String, UnitError>>,
    delay: Option<Duration>,
    fail_reset: bool,
    probe: Probe,
}

impl ScriptedUnit {
    pub fn new(name: &str) -> Self {
        Self {
            descriptor: AgentDescriptor::new(name, ["general_tasks"], format!("Handles {} work", name)),
            script: VecDeque::new(),
            delay: None,
            fail_reset: false,
            probe: Probe::default(),
        }
    }

    pub fn with_script(mut self, script: Vec<Result<String, UnitError>>) -> Self {
        self.script = script.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_failing_reset(mut self) -> Self {
        self.fail_reset = true;
        self
    }

    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }

    pub fn boxed(self) -> Box<dyn Unit> {
        Box::new(self)
    }
}

#[async_trait]
impl Unit for ScriptedUnit {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    fn validate(&self, _task: &str, _context: &RunContext) -> bool {
        true
    }

    async fn execute(&mut self, task: &str, context: &RunContext) -> Result<String, UnitError> {
        self.probe.calls.lock().unwrap().push(Call {
            task: task.to_string(),
            summary: context.summary().map(str::to_string),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.script.pop_front() {
            Some(result) => result,
            None => Ok(format!("{}: {}", self.descriptor.name(), task)),
        }
    }

    fn reset(&mut self) -> Result<(), UnitError> {
        *self.probe.resets.lock().unwrap() += 1;
        if self.fail_reset {
            return Err(UnitError::Fatal("reset hook failed".into()));
        }
        Ok(())
    }
}

/// Queued response that makes [`ScriptedGenerator`] fail the call.
pub const GENERATION_ERROR: &str = "<generation error>";

/// A generator that answers prompts from a queue and records them.
///
/// An exhausted queue answers with empty text; a queued
/// [`GENERATION_ERROR`] fails the call.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    responses: Arc<Mutex<VecDeque<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().map(Into::into).collect())),
            prompts: Arc::default(),
        }
    }

    pub fn push(&self, response: impl Into<String>) {
        self.responses.lock().unwrap().push_back(response.into());
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn shared(&self) -> Arc<dyn TextGenerator> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let content = self.responses.lock().unwrap().pop_front().unwrap_or_default();
        if content == GENERATION_ERROR {
            return Err(GenerationError::Request("connection reset".into()));
        }
        Ok(Generation::text(content))
    }

    fn model(&self) -> &str {
        "scripted"
    }

    fn provider(&self) -> &str {
        "test"
    }
}

/// A generator whose every call fails.
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<Generation, GenerationError> {
        Err(GenerationError::EmptyResponse {
            provider: "test".into(),
        })
    }

    fn model(&self) -> &str {
        "failing"
    }

    fn provider(&self) -> &str {
        "test"
    }
}

pub fn fatal(message: &str) -> Result<String, UnitError> {
    Err(UnitError::Fatal(message.into()))
}

pub fn soft(message: &str) -> Result<String, UnitError> {
    Err(UnitError::Failed(message.into()))
}
