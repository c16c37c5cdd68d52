//! Configuration for the OpenAI-compatible client.

use rag_core::ChatError;
use std::env;

/// Configuration for [`OpenAiClient`](crate::OpenAiClient).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base API URL, without the `/v1` suffix.
    pub api_url: String,

    /// API key for authentication.
    pub api_key: String,

    /// Chat model name.
    pub model: String,

    /// Embedding model name.
    pub embedding_model: String,

    /// Requested embedding dimensions. Must match the vector column.
    pub embedding_dimensions: usize,

    /// Maximum tokens for a response.
    pub max_tokens: Option<u32>,

    /// Temperature for generation (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Timeout for non-streaming requests, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 1536,
            max_tokens: None,
            temperature: Some(0.7),
            request_timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `OPENAI_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `OPENAI_API_URL` - API URL (default: https://api.openai.com)
    /// - `OPENAI_MODEL` - Chat model (default: gpt-4o-mini)
    /// - `OPENAI_EMBEDDING_MODEL` - Embedding model (default: text-embedding-3-small)
    /// - `OPENAI_EMBEDDING_DIMENSIONS` - Embedding dimensions (default: 1536)
    /// - `OPENAI_MAX_TOKENS` - Max tokens (default: provider default)
    /// - `OPENAI_TEMPERATURE` - Temperature (default: 0.7)
    /// - `OPENAI_TIMEOUT_SECS` - Non-streaming request timeout (default: 60)
    pub fn from_env() -> Result<Self, ChatError> {
        let defaults = Self::default();

        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| ChatError::Configuration("OPENAI_API_KEY not set".to_string()))?;

        let api_url = env::var("OPENAI_API_URL").unwrap_or(defaults.api_url);

        let model = env::var("OPENAI_MODEL").unwrap_or(defaults.model);

        let embedding_model =
            env::var("OPENAI_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model);

        let embedding_dimensions = env::var("OPENAI_EMBEDDING_DIMENSIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.embedding_dimensions);

        let max_tokens = env::var("OPENAI_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok());

        let temperature = env::var("OPENAI_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(defaults.temperature);

        let request_timeout_secs = env::var("OPENAI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.request_timeout_secs);

        Ok(Self {
            api_url,
            api_key,
            model,
            embedding_model,
            embedding_dimensions,
            max_tokens,
            temperature,
            request_timeout_secs,
        })
    }

    /// Create a new config builder.
    pub fn builder() -> LlmConfigBuilder {
        LlmConfigBuilder::default()
    }

    /// Base URL with any trailing slash removed.
    pub(crate) fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

/// Builder for LlmConfig.
#[derive(Debug, Default)]
pub struct LlmConfigBuilder {
    config: LlmConfig,
}

impl LlmConfigBuilder {
    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Set the API URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set the chat model name.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the embedding model name.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the embedding dimensions.
    pub fn embedding_dimensions(mut self, dimensions: usize) -> Self {
        self.config.embedding_dimensions = dimensions;
        self
    }

    /// Set the max tokens.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = Some(tokens);
        self
    }

    /// Set the temperature.
    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.temperature = Some(temp);
        self
    }

    /// Set the non-streaming request timeout.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> LlmConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = LlmConfig::builder().api_key("test-key").build();
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.api_url, "https://api.openai.com");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.embedding_dimensions, 1536);
        assert_eq!(config.temperature, Some(0.7));
        assert!(config.max_tokens.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = LlmConfig::builder()
            .api_key("k")
            .api_url("http://localhost:1234/")
            .model("local-model")
            .embedding_dimensions(8)
            .max_tokens(256)
            .build();
        assert_eq!(config.base_url(), "http://localhost:1234");
        assert_eq!(config.model, "local-model");
        assert_eq!(config.embedding_dimensions, 8);
        assert_eq!(config.max_tokens, Some(256));
    }
}
