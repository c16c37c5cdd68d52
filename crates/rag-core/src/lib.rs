//! Core traits and types for the tenant RAG chat crates.
//!
//! This crate provides the shared interface used by every other crate in the
//! workspace. It defines:
//!
//! - [`UserSession`] - Explicit caller identity, threaded into owner-scoped calls
//! - [`HistoryMessage`] / [`ChatRole`] - Conversation messages sent to a model
//! - [`CompletionProvider`] - The seam for streaming chat completions
//! - [`Embedder`] - The seam for turning text into embedding vectors
//! - [`CompletionStream`] - A cancellable stream of completion text deltas
//! - [`ChatError`] - Error types for model and session operations
//!
//! # Example
//!
//! ```rust
//! use rag_core::{
//!     async_trait, CancellationToken, ChatError, CompletionProvider, CompletionRequest,
//!     CompletionStream,
//! };
//!
//! struct EchoProvider;
//!
//! #[async_trait]
//! impl CompletionProvider for EchoProvider {
//!     async fn stream_completion(
//!         &self,
//!         request: CompletionRequest,
//!         cancel: CancellationToken,
//!     ) -> Result<CompletionStream, ChatError> {
//!         let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
//!         Ok(CompletionStream::from_deltas(
//!             futures::stream::iter(vec![Ok(last)]),
//!             cancel,
//!         ))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "EchoProvider"
//!     }
//! }
//! ```

mod completion;
mod embedding;
mod error;
mod message;
mod prompt;
mod session;
mod stream;

pub use completion::{CompletionProvider, CompletionRequest};
pub use embedding::Embedder;
pub use error::ChatError;
pub use message::{ChatRole, HistoryMessage};
pub use prompt::hash_prompt;
pub use session::UserSession;
pub use stream::CompletionStream;

// Re-exports for implementors
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
