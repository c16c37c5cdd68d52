//! OpenAI-compatible client implementing the completion and embedding seams.

use std::time::Duration;

use async_trait::async_trait;
use rag_core::{
    CancellationToken, ChatError, CompletionProvider, CompletionRequest, CompletionStream,
    Embedder,
};
use reqwest::Client;
use reqwest_eventsource::RequestBuilderExt;
use tracing::{debug, info, warn};

use crate::api_types::{
    error_message, ChatCompletionRequest, ChatMessage, EmbeddingRequest, EmbeddingResponse,
};
use crate::config::LlmConfig;
use crate::sse::{await_open, delta_stream};

/// Client for OpenAI-compatible chat and embedding endpoints.
pub struct OpenAiClient {
    client: Client,
    config: LlmConfig,
}

impl OpenAiClient {
    /// Create a new client.
    pub fn new(config: LlmConfig) -> Result<Self, ChatError> {
        if config.api_key.trim().is_empty() {
            return Err(ChatError::Configuration("API key is empty".to_string()));
        }

        let client = Client::builder()
            .build()
            .map_err(|e| ChatError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        info!(
            "Initialized OpenAiClient with model={} embedding_model={}",
            config.model, config.embedding_model
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self, ChatError> {
        Self::new(LlmConfig::from_env()?)
    }

    /// Get the configuration.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn chat_request(&self, request: CompletionRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: request.model.unwrap_or_else(|| self.config.model.clone()),
            messages: request.messages.iter().map(ChatMessage::from).collect(),
            stream: true,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn stream_completion(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<CompletionStream, ChatError> {
        let body = self.chat_request(request);
        let url = format!("{}/v1/chat/completions", self.config.base_url());

        debug!(
            "Streaming completion from {} with {} messages",
            body.model,
            body.messages.len()
        );

        let mut es = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .eventsource()
            .map_err(|e| ChatError::Stream(format!("Failed to open stream: {}", e)))?;

        await_open(&mut es, &cancel).await?;

        Ok(CompletionStream::from_deltas(delta_stream(es), cancel))
    }

    fn name(&self) -> &str {
        "OpenAiClient"
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ChatError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ChatError::Stream("embedding response was empty".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.config.base_url());
        let body = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: texts,
            dimensions: self.config.embedding_dimensions,
        };

        debug!("Embedding {} texts with {}", texts.len(), body.model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = error_message(&text);
            warn!("Embedding request failed: {} - {}", status, message);
            return Err(ChatError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Stream(format!("Failed to parse embeddings: {}", e)))?;

        if parsed.data.len() != texts.len() {
            return Err(ChatError::Stream(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);

        let expected = self.config.embedding_dimensions;
        parsed
            .data
            .into_iter()
            .map(|d| {
                if d.embedding.len() == expected {
                    Ok(d.embedding)
                } else {
                    Err(ChatError::Stream(format!(
                        "embedding has {} dimensions, expected {}",
                        d.embedding.len(),
                        expected
                    )))
                }
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.config.embedding_dimensions
    }
}
