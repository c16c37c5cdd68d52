//! Similarity search over the admin knowledge base and tenant documents.

use std::sync::Arc;

use async_trait::async_trait;
use database::{document, Database, DatabaseError, ScoredDocument};
use rag_core::{ChatError, Embedder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{RagError, Result};

/// A similarity search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub top_n: usize,
    pub owner_id: String,
    pub thread_id: String,
    /// Share of `top_n` drawn from the admin knowledge base.
    pub admin_ratio: f32,
}

/// A retrieved document chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDocument {
    pub id: String,
    pub user_id: String,
    pub page_content: String,
    pub metadata: Value,
    pub chat_thread_id: Option<String>,
    pub is_admin_kb: bool,
    /// Raw vector, when the search backend returns it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// A ranked search hit. Higher scores are closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub score: f64,
    pub document: SearchDocument,
}

impl From<ScoredDocument> for SearchResult {
    fn from(doc: ScoredDocument) -> Self {
        Self {
            score: doc.score,
            document: SearchDocument {
                id: doc.id,
                user_id: doc.user_id,
                page_content: doc.page_content,
                metadata: doc.metadata,
                chat_thread_id: doc.chat_thread_id,
                is_admin_kb: doc.is_admin_kb,
                embedding: None,
            },
        }
    }
}

/// Returns a ranked list of tagged documents for a query.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>>;
}

/// Split `top_n` into `(admin, user)` shares.
///
/// Without an admin knowledge base the user side gets the whole budget.
pub fn split_budget(top_n: usize, admin_ratio: f32, has_admin_kb: bool) -> (usize, usize) {
    if !has_admin_kb {
        return (0, top_n);
    }
    let ratio = if admin_ratio.is_finite() {
        admin_ratio.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let admin = ((top_n as f32) * ratio).round() as usize;
    let admin = admin.min(top_n);
    (admin, top_n - admin)
}

/// pgvector-backed search.
///
/// Embeds the query once, then queries the admin knowledge base and the
/// tenant's thread documents concurrently and merges by score.
pub struct PgVectorSearch {
    embedder: Arc<dyn Embedder>,
    tenant: Database,
    admin_kb: Option<Database>,
}

impl PgVectorSearch {
    pub fn new(embedder: Arc<dyn Embedder>, tenant: Database, admin_kb: Option<Database>) -> Self {
        Self {
            embedder,
            tenant,
            admin_kb,
        }
    }
}

#[async_trait]
impl SimilaritySearch for PgVectorSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        let (admin_k, user_k) =
            split_budget(query.top_n, query.admin_ratio, self.admin_kb.is_some());
        if admin_k + user_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(&query.query).await?;

        let admin = async {
            match &self.admin_kb {
                Some(db) => {
                    document::search_admin_documents(db.pool(), &embedding, admin_k as i64).await
                }
                None => Ok(Vec::new()),
            }
        };
        let user = document::search_user_documents(
            self.tenant.pool(),
            &embedding,
            &query.owner_id,
            &query.thread_id,
            user_k as i64,
        );

        let (admin, user) = futures::try_join!(admin, user).map_err(search_failed)?;
        debug!(admin = admin.len(), user = user.len(), "Similarity search hits");

        Ok(merge_ranked(admin, user))
    }
}

/// Vector query failures are search failures, whatever the database said.
fn search_failed(e: DatabaseError) -> RagError {
    RagError::Chat(ChatError::Search(e.to_string()))
}

/// Merge two ranked lists into one, highest score first.
fn merge_ranked(admin: Vec<ScoredDocument>, user: Vec<ScoredDocument>) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = admin
        .into_iter()
        .chain(user)
        .map(SearchResult::from)
        .collect();
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results
}
