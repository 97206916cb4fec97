//! Google Gemini `generateContent` client.

use super::{http_client, resolve_api_key, send_json};
use crate::config::LlmConfig;
use async_trait::async_trait;
use relay_core::{Generation, GenerationError, TextGenerator};
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_ENV: &str = "GOOGLE_API_KEY";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, GenerationError> {
        if config.model.is_empty() {
            return Err(GenerationError::Config("Model name is required for Gemini client".into()));
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
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            }
        })
    }

    /// Joins the text parts of the first candidate.
    pub(crate) fn parse_response(&self, body: &Value) -> Result<Generation, GenerationError> {
        let candidate = &body["candidates"][0];
        let content: String = candidate["content"]["parts"]
            .as_array()
            .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(GenerationError::EmptyResponse {
                provider: "gemini".to_string(),
            });
        }

        Ok(Generation {
            content,
            model: self.model.clone(),
            provider: "gemini".to_string(),
            tokens_used: body["usageMetadata"]["totalTokenCount"]
                .as_u64()
                .map(|n| n as u32),
            finish_reason: candidate["finishReason"].as_str().map(|s| s.to_lowercase()),
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        tracing::debug!(model = %self.model, chars = prompt.len(), "sending generateContent");

        let request = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt));

        let body = send_json(request).await?;
        self.parse_response(&body)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        "gemini"
    }
}
