//! Application state shared across handlers.

use std::sync::Arc;

use database::Database;
use rag::{PgCitationStore, PgVectorSearch, RagConfig, RagPipeline};
use rag_core::{CompletionProvider, Embedder};
use tenant::TenantRegistry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Tenant pools, provisioned on first use.
    pub registry: Arc<TenantRegistry>,
    /// Streaming chat model.
    pub completion: Arc<dyn CompletionProvider>,
    /// Embedding model used for search and ingestion.
    pub embedder: Arc<dyn Embedder>,
    /// Shared admin knowledge base.
    pub admin_kb: Option<Database>,
    /// Retrieval settings.
    pub rag: RagConfig,
    /// Bearer token required on API routes.
    pub api_token: Option<String>,
}

impl AppState {
    /// Build the chat pipeline for one tenant database.
    pub fn pipeline(&self, tenant: Database) -> RagPipeline {
        let search =
            PgVectorSearch::new(self.embedder.clone(), tenant.clone(), self.admin_kb.clone());
        RagPipeline::new(
            Arc::new(search),
            Arc::new(PgCitationStore::new(tenant)),
            self.completion.clone(),
            self.rag.clone(),
        )
    }
}
