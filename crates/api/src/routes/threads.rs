//! Thread listing and deletion.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use database::ChatThread;
use rag::conversation;

use crate::auth::{authorize, session_from_headers};
use crate::error::Result;
use crate::state::AppState;

/// `GET /api/threads`
pub async fn list_threads(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ChatThread>>> {
    authorize(state.api_token.as_deref(), &headers)?;
    let session = session_from_headers(&headers);

    let db = state.registry.database(&session).await?;
    let threads = conversation::list_threads(&db, &session).await?;

    Ok(Json(threads))
}

/// `DELETE /api/threads/:id`
pub async fn delete_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    authorize(state.api_token.as_deref(), &headers)?;
    let session = session_from_headers(&headers);

    let db = state.registry.database(&session).await?;
    conversation::delete_thread(&db, &session, &id).await?;

    Ok(StatusCode::NO_CONTENT)
}
