//! OpenAI-compatible chat-completions client.

use super::{http_client, resolve_api_key, send_json};
use crate::config::LlmConfig;
use async_trait::async_trait;
use relay_core::{Generation, GenerationError, TextGenerator};
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Client for `/chat/completions`.
///
/// `base_url` may point at any server speaking the same protocol.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, GenerationError> {
        if config.model.is_empty() {
            return Err(GenerationError::Config("Model name is required for OpenAI client".into()));
        }

        Ok(Self {
            http: http_client(config)?,
            api_key: resolve_api_key(config, API_KEY_ENV)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }

    /// Extracts the first choice from a chat-completions response.
    pub(crate) fn parse_response(&self, body: &Value) -> Result<Generation, GenerationError> {
        let choice = &body["choices"][0];
        let content = choice["message"]["content"].as_str().unwrap_or_default();

        if content.trim().is_empty() {
            return Err(GenerationError::EmptyResponse {
                provider: "openai".to_string(),
            });
        }

        Ok(Generation {
            content: content.to_string(),
            model: body["model"].as_str().unwrap_or(&self.model).to_string(),
            provider: "openai".to_string(),
            tokens_used: body["usage"]["total_tokens"].as_u64().map(|n| n as u32),
            finish_reason: choice["finish_reason"].as_str().map(String::from),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %self.model, chars = prompt.len(), "sending chat completion");

        let request = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt));

        let body = send_json(request).await?;
        self.parse_response(&body)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        "openai"
    }
}
