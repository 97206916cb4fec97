//! Run checkpoints with integrity validation.
//!
//! A snapshot is taken after every step that completes without raising.
//! The store keeps the three most recent snapshots; each carries a
//! SHA-256 checksum that is verified before the snapshot is restored.

use crate::workflow::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use relay_core::{ExecutionStep, RunContext};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use uuid::Uuid;

/// Checkpoints retained per run.
pub const MAX_CHECKPOINTS: usize = 3;

/// Unique identifier for a checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointId(pub Uuid);

impl CheckpointId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CheckpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of a run after a successful step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unique checkpoint identifier
    pub id: CheckpointId,
    /// Sequence number (monotonically increasing within a store)
    pub sequence: u64,
    /// Timestamp when the checkpoint was created
    pub timestamp: DateTime<Utc>,
    /// Steps completed when the snapshot was taken; resume starts here
    pub step: usize,
    /// Every step recorded so far, in order
    pub steps: Vec<ExecutionStep>,
    /// Copy of the run context
    pub context: RunContext,
    /// SHA-256 checksum over the fields above
    pub checksum: String,
}

/// Borrowed view of the hashed fields.
#[derive(Serialize)]
struct CheckpointDataForHash<'a> {
    id: CheckpointId,
    sequence: u64,
    timestamp: DateTime<Utc>,
    step: usize,
    steps: &'a [ExecutionStep],
    context: &'a RunContext,
}

impl Checkpoint {
    fn new(sequence: u64, steps: &[ExecutionStep], context: &RunContext) -> Self {
        let mut checkpoint = Self {
            id: CheckpointId::new(),
            sequence,
            timestamp: Utc::now(),
            step: steps.len(),
            steps: steps.to_vec(),
            context: context.clone(),
            checksum: String::new(),
        };
        checkpoint.checksum = checkpoint.compute_checksum();
        checkpoint
    }

    fn compute_checksum(&self) -> String {
        let data = CheckpointDataForHash {
            id: self.id,
            sequence: self.sequence,
            timestamp: self.timestamp,
            step: self.step,
            steps: &self.steps,
            context: &self.context,
        };

        // Serialising plain strings, integers and timestamps cannot fail.
        let bytes = serde_json::to_vec(&data).unwrap_or_default();
        format!("{:x}", Sha256::digest(&bytes))
    }

    /// Returns `true` when the stored checksum matches the content.
    pub fn verify(&self) -> bool {
        self.checksum == self.compute_checksum()
    }
}

/// Bounded FIFO of run checkpoints.
#[derive(Clone, Debug, Default)]
pub struct CheckpointStore {
    checkpoints: VecDeque<Checkpoint>,
    next_sequence: u64,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the run, evicting the oldest checkpoint when full.
    pub fn save(&mut self, steps: &[ExecutionStep], context: &RunContext) -> &Checkpoint {
        let checkpoint = Checkpoint::new(self.next_sequence, steps, context);
        self.next_sequence += 1;

        tracing::debug!(sequence = checkpoint.sequence, step = checkpoint.step, "saved checkpoint");
        if self.checkpoints.len() == MAX_CHECKPOINTS {
            self.checkpoints.pop_front();
        }
        self.checkpoints.push_back(checkpoint);
        &self.checkpoints[self.checkpoints.len() - 1]
    }

    /// Most recent checkpoint, verified.
    ///
    /// # Errors
    ///
    /// [`EngineError::CheckpointCorrupted`] if the checksum does not match.
    pub fn latest(&self) -> Result<Option<&Checkpoint>> {
        match self.checkpoints.back() {
            Some(checkpoint) if !checkpoint.verify() => Err(EngineError::CheckpointCorrupted {
                sequence: checkpoint.sequence,
            }),
            other => Ok(other),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.checkpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn clear(&mut self) {
        self.checkpoints.clear();
        self.next_sequence = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(index: usize) -> ExecutionStep {
        ExecutionStep {
            index,
            task: format!("task {}", index),
            unit: "analyst".to_string(),
            result: format!("result {}", index),
            recovered: false,
            degraded: false,
            attempts: 1,
        }
    }

    #[test]
    fn test_store_is_bounded_fifo() {
        let mut store = CheckpointStore::new();
        let mut steps = Vec::new();
        for i in 1..=5 {
            steps.push(step(i));
            store.save(&steps, &RunContext::new());
            assert!(store.len() <= MAX_CHECKPOINTS);
        }

        let sequences: Vec<u64> = store.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, vec![2, 3, 4]);
        assert_eq!(store.latest().unwrap().unwrap().step, 5);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut store = CheckpointStore::new();
        let mut context = RunContext::new();
        context.insert("analyst_output", "A");
        let mut steps = vec![step(1)];

        store.save(&steps, &context);
        context.insert("analyst_output", "changed");
        steps.push(step(2));

        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.steps.len(), 1);
        assert_eq!(latest.context.get("analyst_output"), Some("A"));
    }

    #[test]
    fn test_tampered_checkpoint_is_rejected() {
        let mut store = CheckpointStore::new();
        store.save(&[step(1)], &RunContext::new());
        store.checkpoints[0].steps[0].result = "tampered".to_string();

        assert!(matches!(
            store.latest(),
            Err(EngineError::CheckpointCorrupted { sequence: 0 })
        ));
    }

    #[test]
    fn test_clear() {
        let mut store = CheckpointStore::new();
        store.save(&[step(1)], &RunContext::new());
        store.clear();

        assert!(store.is_empty());
        assert!(store.latest().unwrap().is_none());
    }
}
