//! Workflow engine: sequencing, recovery and rollback.
//!
//! A [`WorkflowEngine`] runs one request at a time through its units in
//! one of two modes:
//!
//! - **Sequential**: every configured unit runs once, in order. Step 1
//!   receives the request (or the first decomposed subtask when a
//!   decomposer is attached); every later step receives the previous
//!   step's result, unless its decomposed subtask carries explicit
//!   `{step_N_output}` references.
//! - **Router**: the request is decomposed into subtasks and a unit is
//!   selected for each one. A selection of "none" ends the run
//!   successfully with the steps executed so far.
//!
//! # Failure handling
//!
//! Soft unit failures are retried by the [`RetryExecutor`] and never
//! fail the run. A raised fault triggers one inline recovery: the unit
//! is reset and the step retried once. A second fault fails the run,
//! after which every unit is forced back to idle and the workflow ends
//! in `rolled_back`. The next invocation resumes from the most recent
//! checkpoint.

use crate::workflow::checkpoint::CheckpointStore;
use crate::workflow::context::{has_placeholders, ContextPropagator};
use crate::workflow::decompose::TaskDecomposer;
use crate::workflow::error::{EngineError, Result};
use crate::workflow::report::{RunOutput, RunRecord, RunReport, Termination};
use crate::workflow::retry::{RetryExecutor, RetryPolicy};
use crate::workflow::select::{AgentSelector, Selection};
use crate::workflow::state::WorkflowStatus;
use crate::workflow::timeout::RunTimeout;
use chrono::{DateTime, Utc};
use relay_core::{preview, AgentDescriptor, ExecutionStep, RunContext, TextGenerator, Unit, UnitHandle};
use relay_runtime::{RetrySettings, WorkflowConfig};
use std::sync::Arc;
use tokio::time::Instant;

/// Limits applied to every run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Hard ceiling on step count
    pub max_steps: usize,
    /// Run deadline; `None` disables it
    pub run_timeout: Option<RunTimeout>,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            run_timeout: Some(RunTimeout::default()),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Builds limits from a workflow section and the retry settings.
    pub fn from_settings(workflow: &WorkflowConfig, retry: &RetrySettings) -> Self {
        Self {
            max_steps: workflow.max_steps,
            run_timeout: workflow.run_timeout().map(RunTimeout::new),
            retry: RetryPolicy::from(retry),
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Option<RunTimeout>) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// State of the current (or last) invocation.
#[derive(Clone, Debug)]
pub struct WorkflowRun {
    status: WorkflowStatus,
    current_step: usize,
    started_at: Option<DateTime<Utc>>,
    steps: Vec<ExecutionStep>,
    context: RunContext,
    subtasks: Vec<String>,
    failed_step: Option<usize>,
    history: Vec<RunRecord>,
}

impl Default for WorkflowRun {
    fn default() -> Self {
        Self {
            status: WorkflowStatus::Idle,
            current_step: 0,
            started_at: None,
            steps: Vec::new(),
            context: RunContext::new(),
            subtasks: Vec::new(),
            failed_step: None,
            history: Vec::new(),
        }
    }
}

impl WorkflowRun {
    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    /// 1-based index of the step most recently started.
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Subtasks produced by the last decomposition.
    pub fn subtasks(&self) -> &[String] {
        &self.subtasks
    }

    /// 0-based position of the step that raised, if the last run failed there.
    pub fn failed_step(&self) -> Option<usize> {
        self.failed_step
    }

    pub fn history(&self) -> &[RunRecord] {
        &self.history
    }
}

#[derive(Clone)]
enum Sequencing {
    Fixed,
    Router(AgentSelector),
}

/// Orchestrates units over one request at a time.
///
/// # Example
///
/// ```ignore
/// use relay_agent::workflow::{EngineConfig, WorkflowEngine};
///
/// let mut engine = WorkflowEngine::sequential("pipeline", vec![loader, analyst])
///     .with_config(EngineConfig::default().with_max_steps(10));
///
/// let report = engine.run("Analyze last quarter's sales").await;
/// assert!(report.is_success());
/// ```
pub struct WorkflowEngine {
    name: String,
    units: Vec<UnitHandle>,
    descriptors: Vec<AgentDescriptor>,
    sequencing: Sequencing,
    decomposer: Option<TaskDecomposer>,
    retry: RetryExecutor,
    config: EngineConfig,
    run: WorkflowRun,
    checkpoints: CheckpointStore,
}

impl WorkflowEngine {
    /// Creates a fixed pipeline over `units`, in order.
    pub fn sequential(name: impl Into<String>, units: Vec<Box<dyn Unit>>) -> Self {
        Self::with_sequencing(name.into(), units, Sequencing::Fixed, None)
    }

    /// Creates a router that decomposes each request and selects a unit
    /// per subtask, using `generator` for both calls.
    pub fn router(name: impl Into<String>, units: Vec<Box<dyn Unit>>, generator: Arc<dyn TextGenerator>) -> Self {
        let selector = AgentSelector::new(Arc::clone(&generator));
        Self::with_sequencing(
            name.into(),
            units,
            Sequencing::Router(selector),
            Some(TaskDecomposer::new(generator)),
        )
    }

    fn with_sequencing(
        name: String,
        units: Vec<Box<dyn Unit>>,
        sequencing: Sequencing,
        decomposer: Option<TaskDecomposer>,
    ) -> Self {
        let units: Vec<UnitHandle> = units.into_iter().map(UnitHandle::new).collect();
        let descriptors = units.iter().map(|handle| handle.descriptor().clone()).collect();
        let config = EngineConfig::default();

        tracing::info!(workflow = %name, units = units.len(), "initialized workflow");
        Self {
            name,
            units,
            descriptors,
            sequencing,
            decomposer,
            retry: RetryExecutor::new(config.retry.clone()),
            config,
            run: WorkflowRun::default(),
            checkpoints: CheckpointStore::new(),
        }
    }

    /// Seeds sequential runs from a decomposition of the request.
    pub fn with_decomposer(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.decomposer = Some(TaskDecomposer::new(generator));
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.retry = RetryExecutor::new(config.retry.clone());
        self.config = config;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_router(&self) -> bool {
        matches!(self.sequencing, Sequencing::Router(_))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> WorkflowStatus {
        self.run.status
    }

    pub fn run_state(&self) -> &WorkflowRun {
        &self.run
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.run.steps
    }

    pub fn failed_step(&self) -> Option<usize> {
        self.run.failed_step
    }

    pub fn history(&self) -> &[RunRecord] {
        &self.run.history
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    pub fn units(&self) -> &[UnitHandle] {
        &self.units
    }

    pub fn descriptors(&self) -> &[AgentDescriptor] {
        &self.descriptors
    }

    /// Runs `request` to completion.
    ///
    /// Never returns an error: hard faults are reported through a failed
    /// [`RunReport`] after rollback. If the previous run failed after at
    /// least one checkpoint, this run resumes from that checkpoint.
    pub async fn run(&mut self, request: &str) -> RunReport {
        let started = Instant::now();

        if let Err(err) = self.transition(WorkflowStatus::Running) {
            tracing::error!(workflow = %self.name, error = %err, "workflow cannot start");
            return RunReport::rejected(err.to_string());
        }

        self.run.current_step = 0;
        self.run.started_at = Some(Utc::now());
        tracing::info!(workflow = %self.name, request = %preview(request, 50), "starting workflow");

        let outcome = match self.config.run_timeout {
            Some(timeout) => match tokio::time::timeout(timeout.duration(), self.execute(request)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    if self.run.current_step > 0 {
                        self.run.failed_step = Some(self.run.current_step - 1);
                    }
                    Err(EngineError::Timeout {
                        timeout: timeout.duration(),
                    })
                }
            },
            None => self.execute(request).await,
        };

        let duration = started.elapsed().as_secs_f64();
        match outcome {
            Ok(output) => {
                self.run.failed_step = None;
                self.checkpoints.clear();
                self.advance(WorkflowStatus::Completed);
                self.record(request, None);

                tracing::info!(workflow = %self.name, steps = output.steps.len(), duration, "workflow completed");
                RunReport::success(output, duration)
            }
            Err(err) => {
                tracing::error!(workflow = %self.name, step = self.run.current_step, error = %err, "workflow failed");
                self.advance(WorkflowStatus::Failed);
                let rollback = self.rollback();
                self.advance(WorkflowStatus::RolledBack);
                self.record(request, Some(err.to_string()));

                RunReport::failed(err.to_string(), self.run.current_step, duration, rollback)
            }
        }
    }

    /// Clears steps, history, checkpoints and the failed-step marker,
    /// and returns the workflow to `idle`.
    pub fn reset(&mut self) {
        self.run = WorkflowRun::default();
        self.checkpoints.clear();
        tracing::info!(workflow = %self.name, "workflow reset complete");
    }

    async fn execute(&mut self, request: &str) -> Result<RunOutput> {
        if self.units.is_empty() {
            return Err(EngineError::NoUnits);
        }

        let start = self.prepare_run()?;
        let decomposer = self.decomposer.clone();
        let selector = match &self.sequencing {
            Sequencing::Router(selector) => Some(selector.clone()),
            Sequencing::Fixed => None,
        };

        match selector {
            Some(selector) => self.execute_router(request, start, decomposer, &selector).await,
            None => self.execute_fixed(request, start, decomposer).await,
        }
    }

    /// Restores the last checkpoint when resuming a failed run, or clears
    /// run state for a fresh one. Returns the position to start from.
    fn prepare_run(&mut self) -> Result<usize> {
        if self.run.failed_step.is_some() {
            let latest = match self.checkpoints.latest() {
                Ok(latest) => latest.cloned(),
                Err(err) => {
                    self.checkpoints.clear();
                    self.run.failed_step = None;
                    return Err(err);
                }
            };

            if let Some(checkpoint) = latest {
                tracing::info!(
                    workflow = %self.name,
                    step = checkpoint.step + 1,
                    sequence = checkpoint.sequence,
                    "resuming from checkpoint"
                );
                self.run.steps = checkpoint.steps;
                self.run.context = checkpoint.context;
                return Ok(checkpoint.step);
            }
        }

        self.run.steps.clear();
        self.run.context.clear();
        self.run.subtasks.clear();
        self.checkpoints.clear();
        Ok(0)
    }

    async fn execute_fixed(
        &mut self,
        request: &str,
        start: usize,
        decomposer: Option<TaskDecomposer>,
    ) -> Result<RunOutput> {
        if start == 0 {
            if let Some(decomposer) = decomposer {
                self.run.subtasks = decomposer
                    .decompose(request, &self.descriptors)
                    .await
                    .map_err(EngineError::Decomposition)?;
            }
        }

        let mut current = match self.run.steps.last() {
            Some(last) if start > 0 => last.result.clone(),
            _ => self
                .run
                .subtasks
                .first()
                .cloned()
                .unwrap_or_else(|| request.to_string()),
        };

        for position in start..self.units.len() {
            self.begin_step(position)?;

            let source = match self.run.subtasks.get(position) {
                Some(subtask) if position > 0 && has_placeholders(subtask) => subtask.clone(),
                _ => current,
            };
            let task = ContextPropagator::resolve(&source, &self.run.steps).text;

            let step = self.execute_step(position, position, task).await?;
            current = step.result.clone();
            self.commit_step(step);
        }

        Ok(self.output(Termination::AllStepsCompleted))
    }

    async fn execute_router(
        &mut self,
        request: &str,
        start: usize,
        decomposer: Option<TaskDecomposer>,
        selector: &AgentSelector,
    ) -> Result<RunOutput> {
        if start > 0 && !self.run.subtasks.is_empty() {
            tracing::info!(workflow = %self.name, subtasks = self.run.subtasks.len(), "reusing decomposed subtasks");
        } else {
            self.run.subtasks = match decomposer {
                Some(decomposer) => decomposer
                    .decompose(request, &self.descriptors)
                    .await
                    .map_err(EngineError::Decomposition)?,
                None => vec![request.to_string()],
            };
        }

        if self.run.subtasks.is_empty() {
            tracing::warn!(workflow = %self.name, "no subtasks identified");
            return Ok(self.output(Termination::NoSubtasks));
        }

        for position in start..self.run.subtasks.len() {
            self.begin_step(position)?;
            let task = ContextPropagator::resolve(&self.run.subtasks[position], &self.run.steps).text;

            let selection = match selector.select(&task, &self.descriptors).await {
                Ok(selection) => selection,
                Err(err) => {
                    self.run.failed_step = Some(position);
                    return Err(EngineError::Selection(err));
                }
            };

            let unit_index = match &selection {
                Selection::Unit(name) => self.units.iter().position(|handle| handle.name() == name),
                Selection::NoAgent | Selection::Unmatched => None,
            };
            let Some(unit_index) = unit_index else {
                tracing::info!(workflow = %self.name, step = position + 1, ?selection, "no unit selected, finishing run");
                return Ok(self.output(Termination::NoUnitSelected));
            };

            let step = self.execute_step(unit_index, position, task).await?;
            self.commit_step(step);
        }

        Ok(self.output(Termination::AllStepsCompleted))
    }

    /// Enforces the step ceiling and refreshes the context summary.
    fn begin_step(&mut self, position: usize) -> Result<()> {
        let step = position + 1;
        self.run.current_step = step;

        if step > self.config.max_steps {
            return Err(EngineError::MaxStepsExceeded {
                max_steps: self.config.max_steps,
            });
        }

        ContextPropagator::prepare(&mut self.run.context, position, &self.run.steps);
        Ok(())
    }

    /// Runs one step with retry and, on a raised fault, one inline recovery.
    async fn execute_step(&mut self, unit_index: usize, position: usize, task: String) -> Result<ExecutionStep> {
        let step = position + 1;
        let unit = self.units[unit_index].name().to_string();
        tracing::info!(workflow = %self.name, step, unit = %unit, task = %preview(&task, 50), "executing step");

        let (outcome, recovered) = match self
            .retry
            .execute(&mut self.units[unit_index], &task, &self.run.context)
            .await
        {
            Ok(outcome) => (outcome, false),
            Err(err) => {
                tracing::warn!(workflow = %self.name, step, unit = %unit, error = %err, "step raised, attempting recovery");
                self.run.failed_step = Some(position);

                if let Err(reset_err) = self.units[unit_index].recover() {
                    tracing::error!(unit = %unit, error = %reset_err, "inline recovery failed");
                    return Err(EngineError::UnitFault { step, unit, source: err });
                }

                match self
                    .retry
                    .execute(&mut self.units[unit_index], &task, &self.run.context)
                    .await
                {
                    Ok(outcome) => {
                        tracing::info!(workflow = %self.name, step, unit = %unit, "step recovered");
                        self.run.failed_step = None;
                        (outcome, true)
                    }
                    Err(source) => return Err(EngineError::UnitFault { step, unit, source }),
                }
            }
        };

        if outcome.degraded {
            tracing::warn!(workflow = %self.name, step, unit = %unit, attempts = outcome.attempts, "step degraded after retries");
        }

        Ok(ExecutionStep {
            index: step,
            task,
            unit,
            result: outcome.result,
            recovered,
            degraded: outcome.degraded,
            attempts: outcome.attempts,
        })
    }

    /// Records a step and its context entry. Only steps that completed
    /// without raising are checkpointed; a recovered step is not.
    fn commit_step(&mut self, step: ExecutionStep) {
        ContextPropagator::record(&mut self.run.context, &step);
        let checkpoint = !step.recovered;
        self.run.steps.push(step);

        if checkpoint {
            self.checkpoints.save(&self.run.steps, &self.run.context);
        } else {
            tracing::debug!(
                workflow = %self.name,
                step = self.run.steps.len(),
                "skipping checkpoint for recovered step"
            );
        }
    }

    fn output(&self, termination: Termination) -> RunOutput {
        RunOutput::new(self.run.steps.clone(), self.run.context.clone(), termination)
    }

    /// Forces every unit back to idle. Returns `false` if any reset hook failed.
    fn rollback(&mut self) -> bool {
        tracing::info!(workflow = %self.name, "attempting rollback");

        let mut clean = true;
        for handle in &mut self.units {
            if let Err(err) = handle.force_idle() {
                tracing::warn!(unit = %handle.name(), error = %err, "unit reset failed during rollback");
                clean = false;
            }
        }

        if clean {
            tracing::info!(workflow = %self.name, "rollback completed");
        }
        clean
    }

    fn transition(&mut self, next: WorkflowStatus) -> Result<()> {
        let from = self.run.status;
        self.run.status = from.transition_to(next)?;
        tracing::debug!(workflow = %self.name, from = %from, to = %next, "workflow state changed");
        Ok(())
    }

    /// Applies a transition the run loop guarantees is valid.
    fn advance(&mut self, next: WorkflowStatus) {
        if let Err(err) = self.transition(next) {
            tracing::error!(workflow = %self.name, error = %err, "unexpected workflow transition");
        }
    }

    fn record(&mut self, request: &str, error: Option<String>) {
        self.run.history.push(RunRecord {
            request: request.to_string(),
            status: self.run.status,
            error,
            step: self.run.current_step,
            timestamp: Utc::now(),
        });
    }
}

impl std::fmt::Display for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.run.status)
    }
}
