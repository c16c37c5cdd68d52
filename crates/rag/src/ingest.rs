//! Document ingestion: embed chunks and index them for search.

use database::{document, Database, NewDocument};
use rag_core::{ChatError, Embedder, UserSession};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::{RagError, Result};

/// One chunk of text to index.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestChunk {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Value,
}

/// Where ingested chunks are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestTarget {
    /// The caller's own documents, attached to a thread.
    Thread(String),
    /// The shared admin knowledge base. Admins only.
    AdminKnowledgeBase,
}

/// Embed `chunks` and insert them into `db`, returning the new ids in order.
///
/// `db` is the tenant database for [`IngestTarget::Thread`] and the admin
/// knowledge-base database for [`IngestTarget::AdminKnowledgeBase`].
pub async fn ingest_documents(
    embedder: &dyn Embedder,
    db: &Database,
    session: &UserSession,
    target: IngestTarget,
    chunks: Vec<IngestChunk>,
) -> Result<Vec<String>> {
    let owner = session.owner_id()?;

    if target == IngestTarget::AdminKnowledgeBase && !session.is_admin {
        return Err(RagError::Forbidden(
            "only admins may write to the knowledge base".to_string(),
        ));
    }

    let chunks: Vec<IngestChunk> = chunks
        .into_iter()
        .filter(|c| !c.page_content.trim().is_empty())
        .collect();
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.page_content.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;
    if embeddings.len() != texts.len() {
        return Err(RagError::Chat(ChatError::Stream(format!(
            "expected {} embeddings, got {}",
            texts.len(),
            embeddings.len()
        ))));
    }

    let (thread_id, is_admin_kb) = match &target {
        IngestTarget::Thread(id) => (Some(id.clone()), false),
        IngestTarget::AdminKnowledgeBase => (None, true),
    };

    let mut ids = Vec::with_capacity(chunks.len());
    for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
        let new_document = NewDocument {
            page_content: chunk.page_content,
            metadata: if chunk.metadata.is_null() {
                Value::Object(Default::default())
            } else {
                chunk.metadata
            },
            embedding,
            user_id: owner.to_string(),
            chat_thread_id: thread_id.clone(),
            is_admin_kb,
        };
        ids.push(document::insert_document(db.pool(), &new_document).await?);
    }

    info!(count = ids.len(), admin = is_admin_kb, "Indexed document chunks");
    Ok(ids)
}
