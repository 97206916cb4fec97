//! Text-generation port.
//!
//! The orchestrator and the stock units talk to language models only
//! through [`TextGenerator`]. Each call is a single request; callers
//! decide whether to retry.

use crate::error::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Response returned by a text-generation backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    /// Generated text
    pub content: String,
    /// Model that produced the text
    pub model: String,
    /// Backend provider name
    pub provider: String,
    /// Total tokens consumed, when reported
    pub tokens_used: Option<u32>,
    /// Why generation stopped, when reported
    pub finish_reason: Option<String>,
}

impl Generation {
    /// Creates a response carrying only text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: String::new(),
            provider: String::new(),
            tokens_used: None,
            finish_reason: None,
        }
    }
}

/// A backend that answers prompts with text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Sends one prompt and waits for the answer.
    async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError>;

    /// Model identifier used for requests.
    fn model(&self) -> &str;

    /// Provider name (`openai`, `gemini`, ...).
    fn provider(&self) -> &str;
}
