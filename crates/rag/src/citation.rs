//! Citation formatting and persistence.
//!
//! Search hits are redacted before they are stored for display: the source
//! document id and owner are blanked and any vector data is dropped.

use async_trait::async_trait;
use database::{citation, Database};
use futures::future::join_all;
use rag_core::UserSession;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::search::SearchResult;

/// The redacted document stored inside a citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationDocument {
    /// Always empty.
    pub id: String,
    /// Always empty.
    pub user_id: String,
    pub page_content: String,
    pub metadata: Value,
    pub chat_thread_id: Option<String>,
    #[serde(default)]
    pub is_admin_kb: bool,
}

/// A search hit ready to be persisted as a citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedCitation {
    pub score: f64,
    pub document: CitationDocument,
}

/// A citation that was written successfully.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedCitation {
    /// Row id, referenced by the model's citation marker.
    pub id: String,
    pub citation: FormattedCitation,
}

/// Redact search results into citations, preserving order.
pub fn format_citations(results: &[SearchResult]) -> Vec<FormattedCitation> {
    results
        .iter()
        .map(|result| FormattedCitation {
            score: result.score,
            document: CitationDocument {
                id: String::new(),
                user_id: String::new(),
                page_content: result.document.page_content.clone(),
                metadata: result.document.metadata.clone(),
                chat_thread_id: result.document.chat_thread_id.clone(),
                is_admin_kb: result.document.is_admin_kb,
            },
        })
        .collect()
}

/// Citation storage for one tenant.
#[async_trait]
pub trait CitationStore: Send + Sync {
    /// Persist citation content for `owner_id`, returning the new id.
    async fn insert(&self, owner_id: &str, content: &Value) -> Result<String>;

    /// Look a citation up by id, scoped to `owner_id`.
    async fn find(&self, owner_id: &str, id: &str) -> Result<Value>;
}

/// Citation storage in the tenant database.
pub struct PgCitationStore {
    db: Database,
}

impl PgCitationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CitationStore for PgCitationStore {
    async fn insert(&self, owner_id: &str, content: &Value) -> Result<String> {
        let record = citation::create_citation(self.db.pool(), owner_id, content).await?;
        Ok(record.id)
    }

    async fn find(&self, owner_id: &str, id: &str) -> Result<Value> {
        let record = citation::find_citation(self.db.pool(), owner_id, id).await?;
        Ok(record.content)
    }
}

/// Persist every citation concurrently.
///
/// Returns one outcome per input, in input order. A failed item does not
/// fail the batch. An unresolved owner fails the batch before any write.
pub async fn create_citations(
    store: &dyn CitationStore,
    session: &UserSession,
    citations: Vec<FormattedCitation>,
) -> Result<Vec<Result<PersistedCitation>>> {
    let owner = session.owner_id()?;

    let writes = citations
        .into_iter()
        .map(|citation| persist_citation(store, owner, citation));
    let outcomes = join_all(writes).await;

    let failed = outcomes.iter().filter(|o| o.is_err()).count();
    if failed > 0 {
        warn!(failed, total = outcomes.len(), "Some citations were not persisted");
    } else {
        debug!(total = outcomes.len(), "Persisted citations");
    }

    Ok(outcomes)
}

async fn persist_citation(
    store: &dyn CitationStore,
    owner: &str,
    citation: FormattedCitation,
) -> Result<PersistedCitation> {
    let content = serde_json::to_value(&citation)?;
    let id = store.insert(owner, &content).await?;
    Ok(PersistedCitation { id, citation })
}

/// Load a citation for display.
pub async fn find_citation_by_id(
    store: &dyn CitationStore,
    session: &UserSession,
    id: &str,
) -> Result<PersistedCitation> {
    let owner = session.owner_id()?;
    let content = store.find(owner, id).await?;
    let citation: FormattedCitation = serde_json::from_value(content)?;
    Ok(PersistedCitation {
        id: id.to_string(),
        citation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchDocument;
    use serde_json::json;

    fn result(id: &str, admin: bool) -> SearchResult {
        SearchResult {
            score: 0.8,
            document: SearchDocument {
                id: id.to_string(),
                user_id: "owner-hash".to_string(),
                page_content: "the content".to_string(),
                metadata: json!({"fileName": "guide.pdf"}),
                chat_thread_id: Some("thread-1".to_string()),
                is_admin_kb: admin,
                embedding: Some(vec![0.1, 0.2, 0.3]),
            },
        }
    }

    #[test]
    fn test_format_citations_redacts_identity() {
        let formatted = format_citations(&[result("doc-1", false), result("doc-2", true)]);

        assert_eq!(formatted.len(), 2);
        for citation in &formatted {
            assert!(citation.document.id.is_empty());
            assert!(citation.document.user_id.is_empty());
            assert_eq!(citation.score, 0.8);
            assert_eq!(citation.document.page_content, "the content");
            assert_eq!(citation.document.chat_thread_id.as_deref(), Some("thread-1"));
        }
        assert!(formatted[1].document.is_admin_kb);
    }

    #[test]
    fn test_formatted_citation_json_has_no_vector_or_ids() {
        let formatted = format_citations(&[result("doc-1", false)]);
        let value = serde_json::to_value(&formatted[0]).unwrap();

        assert_eq!(value["document"]["id"], "");
        assert_eq!(value["document"]["userId"], "");
        assert_eq!(value["document"]["pageContent"], "the content");
        assert_eq!(value["document"]["chatThreadId"], "thread-1");
        assert!(value["document"].get("embedding").is_none());
        assert!(!value.to_string().contains("owner-hash"));
        assert!(!value.to_string().contains("doc-1"));
    }

    #[test]
    fn test_format_citations_empty() {
        assert!(format_citations(&[]).is_empty());
    }
}
