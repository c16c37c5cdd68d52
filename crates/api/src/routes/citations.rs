//! Citation lookup for inline display.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use rag::{find_citation_by_id, PersistedCitation, PgCitationStore};

use crate::auth::{authorize, session_from_headers};
use crate::error::Result;
use crate::state::AppState;

/// `GET /api/citations/:id`
pub async fn get_citation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<PersistedCitation>> {
    authorize(state.api_token.as_deref(), &headers)?;
    let session = session_from_headers(&headers);

    let db = state.registry.database(&session).await?;
    let store = PgCitationStore::new(db);
    let citation = find_citation_by_id(&store, &session, &id).await?;

    Ok(Json(citation))
}
