use super::{GeminiClient, OpenAiClient};
use crate::config::LlmConfig;
use relay_core::{GenerationError, TextGenerator};
use std::collections::HashMap;
use std::sync::Arc;

const PROVIDERS: &[&str] = &["openai", "gemini"];

/// Creates text-generation clients by provider name, caching one
/// instance per `provider:model`.
#[derive(Default)]
pub struct LlmFactory {
    clients: HashMap<String, Arc<dyn TextGenerator>>,
}

impl LlmFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached client for this provider and model, creating it
    /// on first use.
    pub fn create_client(&mut self, config: &LlmConfig) -> Result<Arc<dyn TextGenerator>, GenerationError> {
        let provider = config.provider.to_lowercase();
        if !self.is_provider_available(&provider) {
            return Err(GenerationError::Config(format!(
                "Unsupported provider: '{}'. Supported: {}",
                provider,
                PROVIDERS.join(", ")
            )));
        }

        let key = cache_key(&provider, &config.model);
        if let Some(client) = self.clients.get(&key) {
            tracing::debug!(client = %key, "returning cached client");
            return Ok(Arc::clone(client));
        }

        let client: Arc<dyn TextGenerator> = match provider.as_str() {
            "openai" => Arc::new(OpenAiClient::new(config)?),
            _ => Arc::new(GeminiClient::new(config)?),
        };

        tracing::info!(provider = %provider, model = %config.model, "created text-generation client");
        self.clients.insert(key, Arc::clone(&client));
        Ok(client)
    }

    pub fn providers(&self) -> Vec<&'static str> {
        PROVIDERS.to_vec()
    }

    pub fn is_provider_available(&self, provider: &str) -> bool {
        PROVIDERS.contains(&provider.to_lowercase().as_str())
    }

    pub fn cached_client(&self, provider: &str, model: &str) -> Option<Arc<dyn TextGenerator>> {
        self.clients.get(&cache_key(&provider.to_lowercase(), model)).cloned()
    }

    pub fn clear_cache(&mut self) {
        self.clients.clear();
        tracing::info!("cleared client cache");
    }
}

fn cache_key(provider: &str, model: &str) -> String {
    format!("{}:{}", provider, model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str, model: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            model: model.to_string(),
            api_key: Some("test-key".to_string()),
            base_url: None,
            temperature: 0.7,
            max_tokens: 1000,
            timeout: 30,
        }
    }

    #[test]
    fn test_clients_are_cached_per_model() {
        let mut factory = LlmFactory::new();
        let first = factory.create_client(&config("OpenAI", "gpt-4o-mini")).unwrap();
        let second = factory.create_client(&config("openai", "gpt-4o-mini")).unwrap();
        let other = factory.create_client(&config("openai", "gpt-4o")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert!(factory.cached_client("openai", "gpt-4o").is_some());

        factory.clear_cache();
        assert!(factory.cached_client("openai", "gpt-4o").is_none());
    }

    #[test]
    fn test_gemini_provider() {
        let mut factory = LlmFactory::new();
        let client = factory.create_client(&config("gemini", "gemini-1.5-flash")).unwrap();
        assert_eq!(client.provider(), "gemini");
        assert_eq!(client.model(), "gemini-1.5-flash");
    }

    #[test]
    fn test_unknown_provider() {
        let mut factory = LlmFactory::new();
        let err = factory.create_client(&config("anthropic", "x")).err().unwrap();
        assert!(err.to_string().contains("Unsupported provider: 'anthropic'"));
        assert!(!factory.is_provider_available("anthropic"));
        assert_eq!(factory.providers(), vec!["openai", "gemini"]);
    }
}
