//! OpenAI-compatible model client.
//!
//! This crate talks to any server exposing the OpenAI chat completions and
//! embeddings endpoints.
//!
//! # Features
//!
//! - Streaming chat completions over server-sent events, with cancellation
//! - Batched embeddings for similarity search and ingestion
//! - Configurable via environment variables or a builder
//!
//! # Usage
//!
//! ```rust,no_run
//! use llm_client::{LlmConfig, OpenAiClient};
//! use rag_core::{CancellationToken, CompletionProvider, CompletionRequest, HistoryMessage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OpenAiClient::new(LlmConfig::from_env()?)?;
//!     let request = CompletionRequest::new(vec![HistoryMessage::user("Hello")]);
//!     let stream = client.stream_completion(request, CancellationToken::new()).await?;
//!     println!("{}", stream.collect_text().await?);
//!     Ok(())
//! }
//! ```

mod api_types;
mod client;
mod config;
mod sse;

pub use client::OpenAiClient;
pub use config::{LlmConfig, LlmConfigBuilder};

// Re-export rag-core types for convenience
pub use rag_core::{ChatError, CompletionProvider, CompletionRequest, CompletionStream, Embedder};
