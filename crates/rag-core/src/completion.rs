//! The completion provider seam.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ChatError;
use crate::message::HistoryMessage;
use crate::stream::CompletionStream;

/// A streaming chat completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Model override. `None` uses the provider's configured model.
    pub model: Option<String>,
    /// Ordered messages: system, history, then the current user turn.
    pub messages: Vec<HistoryMessage>,
}

impl CompletionRequest {
    /// Create a request for the provider's default model.
    pub fn new(messages: Vec<HistoryMessage>) -> Self {
        Self {
            model: None,
            messages,
        }
    }

    /// Use a specific model for this request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// A model that answers with an incrementally consumable token stream.
///
/// This trait is object-safe and can be used with `Arc<dyn CompletionProvider>`.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Open a streaming completion.
    ///
    /// Returns once the provider has accepted the request. Failures to open
    /// the stream (transport errors, non-success status) are returned here.
    /// Cancelling `cancel` must abort the in-flight request and end the
    /// returned stream.
    async fn stream_completion(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<CompletionStream, ChatError>;

    /// Human-readable provider name.
    fn name(&self) -> &str;
}
