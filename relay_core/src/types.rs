//! Core types shared by units and the orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Static description of a registered unit.
///
/// Descriptors are immutable once created; the name is the unique key
/// used by selection and by the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    name: String,
    capabilities: BTreeSet<String>,
    description: String,
}

impl AgentDescriptor {
    /// Creates a new descriptor.
    pub fn new<I, S>(name: impl Into<String>, capabilities: I, description: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            description: description.into(),
        }
    }

    /// Unique unit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capability set advertised by the unit.
    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns `true` if every required capability is advertised.
    pub fn has_capabilities<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required
            .iter()
            .all(|cap| self.capabilities.contains(cap.as_ref()))
    }
}

/// Execution state of a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    /// Ready to accept a task
    Idle,
    /// Currently executing a task
    Running,
    /// Last task completed successfully
    Completed,
    /// Last task failed
    Failed,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UnitState::Idle => "idle",
            UnitState::Running => "running",
            UnitState::Completed => "completed",
            UnitState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Mutable key/value context scoped to a single run.
///
/// Holds the rolling `summary` entry and one `<unit>_output` entry per
/// unit that has produced a result.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunContext {
    entries: BTreeMap<String, String>,
}

impl RunContext {
    /// Key holding the cross-step recap.
    pub const SUMMARY_KEY: &'static str = "summary";

    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Key under which a unit's latest output is stored.
    pub fn output_key(unit: &str) -> String {
        format!("{}_output", unit)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Current recap, if one has been built.
    pub fn summary(&self) -> Option<&str> {
        self.get(Self::SUMMARY_KEY)
    }

    /// Records the latest output of `unit`.
    pub fn set_unit_output(&mut self, unit: &str, output: impl Into<String>) {
        self.entries.insert(Self::output_key(unit), output.into());
    }

    /// Latest output recorded for `unit`.
    pub fn unit_output(&self, unit: &str) -> Option<&str> {
        self.get(&Self::output_key(unit))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RunContext {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// One recorded unit invocation within a run.
///
/// Steps are appended in order and never mutated once recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// 1-based ordinal within the run
    pub index: usize,
    /// Task text after placeholder resolution
    pub task: String,
    /// Name of the unit that executed the step
    pub unit: String,
    /// Result text handed to the next step
    pub result: String,
    /// Whether the step succeeded only after inline recovery
    pub recovered: bool,
    /// Whether every retry attempt failed and `result` is a degraded summary
    pub degraded: bool,
    /// Number of attempts the retry loop spent on the step
    pub attempts: u32,
}
