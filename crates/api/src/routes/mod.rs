//! Route handlers.

pub mod chat;
pub mod citations;
pub mod documents;
pub mod health;
pub mod threads;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health::health))
        // Chat
        .route("/api/chat", post(chat::chat))
        .route("/api/citations/:id", get(citations::get_citation))
        .route("/api/threads", get(threads::list_threads))
        .route("/api/threads/:id", delete(threads::delete_thread))
        // Ingestion
        .route("/api/documents", post(documents::ingest))
}
