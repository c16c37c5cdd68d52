//! OpenAI API request and response types.

use rag_core::HistoryMessage;
use serde::{Deserialize, Serialize};

/// A chat message on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", "assistant", "tool" or "function"
    pub role: String,
    /// Message content
    pub content: String,
}

impl From<&HistoryMessage> for ChatMessage {
    fn from(message: &HistoryMessage) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }
}

/// Streaming chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Model to use
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<ChatMessage>,
    /// Always true; this client only streams
    pub stream: bool,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// One server-sent chunk of a streaming completion.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChunk {
    /// Chunk choices (usually one)
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// A choice inside a streaming chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    /// Incremental message content
    #[serde(default)]
    pub delta: ChunkDelta,
    /// Set on the final chunk
    pub finish_reason: Option<String>,
}

/// Incremental message content.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    /// Text fragment, if any
    pub content: Option<String>,
}

/// Embedding request.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest<'a> {
    /// Embedding model
    pub model: &'a str,
    /// Texts to embed
    pub input: &'a [String],
    /// Requested output dimensions
    pub dimensions: usize,
}

/// Embedding response.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingResponse {
    /// One entry per input text
    pub data: Vec<EmbeddingData>,
}

/// A single embedding.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingData {
    /// Position of the input this embedding belongs to
    pub index: usize,
    /// The vector
    pub embedding: Vec<f32>,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    /// Error details
    pub error: ApiErrorDetails,
}

/// API error details.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetails {
    /// Error message
    pub message: String,
    /// Error type
    #[serde(rename = "type")]
    pub error_type: Option<String>,
}

/// Turn a non-success response body into a readable message.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(api_error) => api_error.error.message,
        Err(_) => body.to_string(),
    }
}
