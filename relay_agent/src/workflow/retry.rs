//! Bounded retry of a single step.
//!
//! Each attempt is classified into an [`AttemptOutcome`]. Soft failures
//! are retried after a fixed delay and, once attempts run out, folded
//! into a degraded result string. Raised and fatal failures are handed
//! back immediately so the engine can run inline recovery.

use relay_core::{RunContext, UnitError, UnitHandle};
use relay_runtime::RetrySettings;
use std::time::Duration;

/// Prefix by which text-reporting units signal a failed attempt.
pub const ERROR_PREFIX: &str = "Error:";

/// Retry configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per step, including the first
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Attempts actually made; a policy of zero still runs once.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(settings.max_retries, settings.delay())
    }
}

/// How an attempt failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Transient; retried and eventually absorbed
    Soft,
    /// The unit rejected its input
    Raised,
    /// Unrecoverable for this input
    Fatal,
}

/// Classified result of one attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(String),
    Failure { kind: FailureKind, message: String },
}

impl AttemptOutcome {
    /// Classifies a unit invocation.
    ///
    /// Text starting with [`ERROR_PREFIX`] counts as a soft failure.
    pub fn classify(result: Result<String, UnitError>) -> Self {
        match result {
            Ok(text) if text.starts_with(ERROR_PREFIX) => AttemptOutcome::Failure {
                kind: FailureKind::Soft,
                message: text,
            },
            Ok(text) => AttemptOutcome::Success(text),
            Err(err) => {
                let kind = match err {
                    UnitError::Failed(_) => FailureKind::Soft,
                    UnitError::InvalidInput(_) => FailureKind::Raised,
                    UnitError::Fatal(_) => FailureKind::Fatal,
                };
                AttemptOutcome::Failure {
                    kind,
                    message: err.to_string(),
                }
            }
        }
    }
}

/// What the retry loop produced for one step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryOutcome {
    /// Result text for the step
    pub result: String,
    /// Attempts spent
    pub attempts: u32,
    /// Whether every attempt failed
    pub degraded: bool,
}

/// Runs a unit with bounded, fixed-delay retry.
#[derive(Clone, Debug, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invokes `handle` on `task` until it succeeds or attempts run out.
    ///
    /// Exhaustion is not an error: the returned outcome carries a
    /// degraded result naming the attempt count and the last failure.
    /// Only raised and fatal failures are returned as `Err`.
    pub async fn execute(
        &self,
        handle: &mut UnitHandle,
        task: &str,
        context: &RunContext,
    ) -> Result<RetryOutcome, UnitError> {
        let attempts = self.policy.attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let result = handle.invoke(task, context).await;
            let raised = result.as_ref().err().filter(|err| !err.is_retryable()).cloned();

            match AttemptOutcome::classify(result) {
                AttemptOutcome::Success(result) => {
                    return Ok(RetryOutcome {
                        result,
                        attempts: attempt,
                        degraded: false,
                    });
                }
                AttemptOutcome::Failure {
                    kind: FailureKind::Soft,
                    message,
                } => {
                    tracing::warn!(unit = %handle.name(), attempt, error = %message, "attempt failed");
                    last_error = message;
                }
                AttemptOutcome::Failure { kind, message } => {
                    tracing::error!(unit = %handle.name(), attempt, ?kind, error = %message, "attempt raised");
                    return Err(raised.unwrap_or(UnitError::Fatal(message)));
                }
            }

            if attempt < attempts {
                tracing::info!(unit = %handle.name(), next = attempt + 1, of = attempts, "retrying");
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        Ok(RetryOutcome {
            result: format!("Failed after {} attempts. Last error: {}", attempts, last_error),
            attempts,
            degraded: true,
        })
    }
}
