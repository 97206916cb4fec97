//! Error types for RelayKit core.

use crate::memory::MemoryKind;

/// Error raised by a unit while handling a task.
///
/// The variant decides how the orchestrator treats the failure: `Failed`
/// is retried and eventually absorbed, `InvalidInput` and `Fatal` are
/// raised to the workflow.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    /// The unit rejected the task during validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A transient execution failure.
    #[error("Execution failed: {0}")]
    Failed(String),

    /// A failure that retrying the same input cannot fix.
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl UnitError {
    /// Returns `true` when the retry loop may attempt the task again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, UnitError::Failed(_))
    }
}

/// Error returned by a text-generation backend.
#[derive(thiserror::Error, Debug)]
pub enum GenerationError {
    /// The request could not be sent or the body could not be read.
    #[error("Request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code returned by the backend
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// The backend answered without any text.
    #[error("Empty response from {provider}")]
    EmptyResponse {
        /// Provider that produced the empty answer
        provider: String,
    },

    /// The client is misconfigured (missing key, model, ...).
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error returned by the unit registry.
#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    /// No unit is registered under the requested name.
    #[error("Unit not registered: {0}")]
    UnknownUnit(String),

    /// The constructor for a unit failed.
    #[error("Failed to construct unit {name}: {reason}")]
    Construction {
        /// Registered name of the unit
        name: String,
        /// Constructor failure message
        reason: String,
    },
}

/// Error returned by unit memory operations.
#[derive(thiserror::Error, Debug)]
pub enum MemoryError {
    /// Nothing has been stored under this kind yet
    #[error("No {0} memory stored")]
    EmptyBuffer(MemoryKind),

    /// Message index past the end of the buffer
    #[error("Message index {index} out of range for {kind} memory of {len} messages")]
    IndexOutOfRange {
        kind: MemoryKind,
        index: usize,
        len: usize,
    },

    /// The summary request failed
    #[error("Memory compression failed: {0}")]
    Compression(#[source] GenerationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UnitError::Failed("backend down".to_string());
        assert_eq!(err.to_string(), "Execution failed: backend down");

        let err = GenerationError::Http {
            status: 429,
            body: "slow down".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 429: slow down");
    }

    #[test]
    fn test_only_failed_is_retryable() {
        assert!(UnitError::Failed("x".into()).is_retryable());
        assert!(!UnitError::InvalidInput("x".into()).is_retryable());
        assert!(!UnitError::Fatal("x".into()).is_retryable());
    }
}
