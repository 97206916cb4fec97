//! HTTP text-generation clients.
//!
//! Each client implements [`TextGenerator`](relay_core::TextGenerator)
//! over `reqwest`. Clients issue exactly one request per call and never
//! retry; retry policy belongs to the orchestrator.

mod factory;
mod gemini;
mod openai;

pub use factory::LlmFactory;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use crate::config::LlmConfig;
use relay_core::GenerationError;

/// Resolves the API key from configuration, falling back to `env_var`.
pub(crate) fn resolve_api_key(config: &LlmConfig, env_var: &str) -> Result<String, GenerationError> {
    config
        .api_key
        .clone()
        .filter(|key| !key.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|key| !key.is_empty()))
        .ok_or_else(|| {
            GenerationError::Config(format!(
                "{} API key not found in config or {} environment variable",
                config.provider, env_var
            ))
        })
}

/// Builds a `reqwest` client with the configured request timeout.
pub(crate) fn http_client(config: &LlmConfig) -> Result<reqwest::Client, GenerationError> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| GenerationError::Config(e.to_string()))
}

/// Sends a JSON request and returns the decoded body, mapping non-success
/// status codes to [`GenerationError::Http`].
pub(crate) async fn send_json(request: reqwest::RequestBuilder) -> Result<serde_json::Value, GenerationError> {
    let response = request
        .send()
        .await
        .map_err(|e| GenerationError::Request(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GenerationError::Http {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| GenerationError::Request(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: api_key.map(String::from),
            base_url: None,
            temperature: 0.7,
            max_tokens: 1000,
            timeout: 30,
        }
    }

    #[test]
    fn test_api_key_prefers_config() {
        std::env::set_var("RELAY_TEST_KEY_A", "from-env");
        let key = resolve_api_key(&config(Some("from-config")), "RELAY_TEST_KEY_A").unwrap();
        assert_eq!(key, "from-config");
    }

    #[test]
    fn test_api_key_falls_back_to_env() {
        std::env::set_var("RELAY_TEST_KEY_B", "from-env");
        let key = resolve_api_key(&config(Some("")), "RELAY_TEST_KEY_B").unwrap();
        assert_eq!(key, "from-env");
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        std::env::remove_var("RELAY_TEST_KEY_C");
        let err = resolve_api_key(&config(None), "RELAY_TEST_KEY_C").unwrap_err();
        assert!(matches!(err, GenerationError::Config(msg) if msg.contains("RELAY_TEST_KEY_C")));
    }
}
