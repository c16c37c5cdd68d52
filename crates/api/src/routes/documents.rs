//! Document ingestion endpoint.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use rag::{ingest_documents, IngestChunk, IngestTarget};
use serde::{Deserialize, Serialize};

use crate::auth::{authorize, session_from_headers};
use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Request to index document chunks.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    /// Thread the chunks belong to. Required unless writing to the admin
    /// knowledge base.
    pub thread_id: Option<String>,
    /// Write to the shared admin knowledge base instead.
    #[serde(default)]
    pub admin_knowledge_base: bool,
    pub chunks: Vec<IngestChunk>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub ids: Vec<String>,
}

/// `POST /api/documents`
pub async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>> {
    authorize(state.api_token.as_deref(), &headers)?;
    let session = session_from_headers(&headers);
    session.owner_id()?;

    let target = target_for(&request)?;
    let db = match target {
        IngestTarget::AdminKnowledgeBase => state.admin_kb.clone().ok_or_else(|| {
            ApiError::BadRequest("no admin knowledge base is configured".to_string())
        })?,
        IngestTarget::Thread(_) => state.registry.database(&session).await?,
    };

    let ids = ingest_documents(
        state.embedder.as_ref(),
        &db,
        &session,
        target,
        request.chunks,
    )
    .await?;

    Ok(Json(IngestResponse { ids }))
}

fn target_for(request: &IngestRequest) -> Result<IngestTarget> {
    if request.admin_knowledge_base {
        return Ok(IngestTarget::AdminKnowledgeBase);
    }
    match request.thread_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(IngestTarget::Thread(id.to_string())),
        _ => Err(ApiError::BadRequest("threadId is required".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> IngestRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_target_for_thread() {
        let req = request(serde_json::json!({
            "threadId": "t1",
            "chunks": [{"pageContent": "hello", "metadata": {"fileName": "a.txt"}}]
        }));
        assert_eq!(target_for(&req).unwrap(), IngestTarget::Thread("t1".to_string()));
        assert_eq!(req.chunks[0].page_content, "hello");
    }

    #[test]
    fn test_target_for_admin() {
        let req = request(serde_json::json!({"adminKnowledgeBase": true, "chunks": []}));
        assert_eq!(target_for(&req).unwrap(), IngestTarget::AdminKnowledgeBase);
    }

    #[test]
    fn test_target_requires_thread() {
        let req = request(serde_json::json!({"threadId": " ", "chunks": []}));
        assert!(matches!(target_for(&req), Err(ApiError::BadRequest(_))));
    }
}
