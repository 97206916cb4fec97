//! Per-unit conversational memory.
//!
//! A [`UnitMemory`] keeps one message buffer per [`MemoryKind`]. Each
//! exchange is stored as an input message followed by an output message.
//! Buffers can be read whole or by their most recent messages, viewed as a
//! window of recent exchanges, edited in place, and compressed into a
//! single summary through a [`TextGenerator`].

use crate::error::MemoryError;
use crate::generate::TextGenerator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const COMPRESSION_PROMPT: &str = "Summarize the following exchanges so that an agent can continue \
the work without the full transcript. Keep facts, decisions and open questions.\n\n";

/// Which buffer a message belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Exchanges with the end user
    Conversation,
    /// Task-level notes
    Task,
    /// The unit's own task/output pairs
    Agent,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 3] = [MemoryKind::Conversation, MemoryKind::Task, MemoryKind::Agent];

    pub fn as_str(self) -> &'static str {
        match self {
            MemoryKind::Conversation => "conversation",
            MemoryKind::Task => "task",
            MemoryKind::Agent => "agent",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Author of a stored message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Input,
    Output,
    /// Replaces a compressed buffer
    Summary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMessage {
    pub role: MessageRole,
    pub content: String,
}

impl MemoryMessage {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One input/output pair from a window view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exchange {
    pub input: String,
    pub output: String,
}

/// Message buffers keyed by [`MemoryKind`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitMemory {
    buffers: BTreeMap<MemoryKind, Vec<MemoryMessage>>,
}

impl UnitMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one exchange to the `kind` buffer.
    pub fn store(&mut self, kind: MemoryKind, input: impl Into<String>, output: impl Into<String>) {
        let buffer = self.buffers.entry(kind).or_default();
        buffer.push(MemoryMessage::new(MessageRole::Input, input));
        buffer.push(MemoryMessage::new(MessageRole::Output, output));
        tracing::debug!(kind = %kind, messages = buffer.len(), "stored exchange");
    }

    /// Messages of `kind`, oldest first. `last_k` keeps only the most
    /// recent `k` messages.
    pub fn retrieve(&self, kind: MemoryKind, last_k: Option<usize>) -> &[MemoryMessage] {
        let buffer = self.buffers.get(&kind).map(Vec::as_slice).unwrap_or_default();
        match last_k {
            Some(k) if k < buffer.len() => &buffer[buffer.len() - k..],
            _ => buffer,
        }
    }

    /// Replaces the content of one message, keeping its role.
    pub fn update(&mut self, kind: MemoryKind, index: usize, content: impl Into<String>) -> Result<(), MemoryError> {
        let buffer = self.buffers.get_mut(&kind).ok_or(MemoryError::EmptyBuffer(kind))?;
        let len = buffer.len();
        let message = buffer
            .get_mut(index)
            .ok_or(MemoryError::IndexOutOfRange { kind, index, len })?;

        message.content = content.into();
        tracing::debug!(kind = %kind, index, "updated message");
        Ok(())
    }

    /// The last `window_size` complete exchanges of `kind`.
    pub fn window(&self, kind: MemoryKind, window_size: usize) -> Vec<Exchange> {
        let recent = self.retrieve(kind, Some(window_size.saturating_mul(2)));
        recent
            .windows(2)
            .filter(|pair| pair[0].role == MessageRole::Input && pair[1].role == MessageRole::Output)
            .map(|pair| Exchange {
                input: pair[0].content.clone(),
                output: pair[1].content.clone(),
            })
            .collect()
    }

    /// Rough token estimate for a buffer, at four characters per token.
    pub fn estimated_tokens(&self, kind: MemoryKind) -> usize {
        self.retrieve(kind, None)
            .iter()
            .map(|message| message.content.chars().count())
            .sum::<usize>()
            .div_ceil(4)
    }

    /// Replaces the `kind` buffer with a generated summary once it grows
    /// past `max_tokens`. Returns whether compression happened.
    pub async fn compress(
        &mut self,
        kind: MemoryKind,
        generator: &dyn TextGenerator,
        max_tokens: usize,
    ) -> Result<bool, MemoryError> {
        let tokens = self.estimated_tokens(kind);
        if tokens <= max_tokens {
            return Ok(false);
        }

        let transcript = self
            .retrieve(kind, None)
            .iter()
            .map(|message| {
                let label = match message.role {
                    MessageRole::Input => "Input",
                    MessageRole::Output => "Output",
                    MessageRole::Summary => "Summary",
                };
                format!("{}: {}", label, message.content)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let generation = generator
            .generate(&format!("{}{}", COMPRESSION_PROMPT, transcript))
            .await
            .map_err(MemoryError::Compression)?;

        self.buffers
            .insert(kind, vec![MemoryMessage::new(MessageRole::Summary, generation.content.trim())]);
        tracing::info!(kind = %kind, tokens, max_tokens, "compressed memory");
        Ok(true)
    }

    /// Clears one buffer, or every buffer when `kind` is `None`.
    pub fn clear(&mut self, kind: Option<MemoryKind>) {
        match kind {
            Some(kind) => {
                self.buffers.remove(&kind);
            }
            None => self.buffers.clear(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.values().all(Vec::is_empty)
    }
}
