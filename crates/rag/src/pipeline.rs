//! The retrieval-augmented chat turn.

use std::sync::Arc;

use database::ChatThread;
use rag_core::{
    hash_prompt, CancellationToken, CompletionProvider, CompletionRequest, CompletionStream,
    HistoryMessage, UserSession,
};
use tracing::{debug, info, warn};

use crate::citation::{create_citations, format_citations, CitationStore, PersistedCitation};
use crate::config::RagConfig;
use crate::error::Result;
use crate::prompt::{augment_user_message, build_context, build_messages};
use crate::search::{SearchQuery, SimilaritySearch};

/// An open chat turn.
pub struct ChatTurnStream {
    /// Citations offered to the model, in display order.
    pub citations: Vec<PersistedCitation>,
    /// Completion deltas.
    pub stream: CompletionStream,
}

/// Runs chat turns against one tenant.
pub struct RagPipeline {
    search: Arc<dyn SimilaritySearch>,
    citations: Arc<dyn CitationStore>,
    completion: Arc<dyn CompletionProvider>,
    config: RagConfig,
}

impl RagPipeline {
    pub fn new(
        search: Arc<dyn SimilaritySearch>,
        citations: Arc<dyn CitationStore>,
        completion: Arc<dyn CompletionProvider>,
        config: RagConfig,
    ) -> Self {
        Self {
            search,
            citations,
            completion,
            config,
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Run one turn and return the open completion stream.
    ///
    /// An unresolved owner fails before any search, write or model call.
    /// A failed search continues with no citations. Failing to open the
    /// completion is returned as an error. Cancelling `cancel` aborts the
    /// model request and ends the stream.
    pub async fn chat_turn(
        &self,
        session: &UserSession,
        thread: &ChatThread,
        user_message: &str,
        history: &[HistoryMessage],
        cancel: CancellationToken,
        admin_ratio: Option<f32>,
    ) -> Result<ChatTurnStream> {
        let owner = session.owner_id()?;

        let query = SearchQuery {
            query: user_message.to_string(),
            top_n: self.config.top_n,
            owner_id: owner.to_string(),
            thread_id: thread.id.clone(),
            admin_ratio: admin_ratio.unwrap_or(self.config.admin_ratio),
        };

        let results = match self.search.search(&query).await {
            Ok(results) => results,
            Err(e) => {
                warn!(
                    thread = %thread.id,
                    "Similarity search failed, continuing without context: {}", e
                );
                Vec::new()
            }
        };

        let formatted = format_citations(&results);
        let citations: Vec<PersistedCitation> =
            create_citations(self.citations.as_ref(), session, formatted)
                .await?
                .into_iter()
                .filter_map(|outcome| outcome.ok())
                .collect();

        let context = build_context(&citations);
        let augmented = augment_user_message(user_message, &context);
        let messages = build_messages(&thread.persona_message, history, augmented);

        info!(
            thread = %thread.id,
            hits = results.len(),
            citations = citations.len(),
            history = history.len(),
            persona = %hash_prompt(&thread.persona_message),
            "Opening completion via {}",
            self.completion.name()
        );

        let mut request = CompletionRequest::new(messages);
        if let Some(model) = &self.config.model {
            request = request.with_model(model.clone());
        }

        let stream = self.completion.stream_completion(request, cancel).await?;
        debug!(thread = %thread.id, "Completion stream open");

        Ok(ChatTurnStream { citations, stream })
    }
}
