//! HTTP service for retrieval-augmented chat.
//!
//! Each authenticated user gets an isolated Postgres database, provisioned
//! on first request. Chat turns search the shared admin knowledge base and
//! the user's own documents, store citations, and stream the model's answer
//! back as server-sent events.

mod auth;
mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use database::Database;
use llm_client::{LlmConfig, OpenAiClient};
use rag::RagConfig;
use tenant::{NeonClient, PgSchemaInitializer, ProviderConfig, TenantProvisioner, TenantRegistry};
use tracing::info;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let rag_config = RagConfig::from_env()?;
    info!(addr = %config.addr, top_n = rag_config.top_n, "Starting RAG API");

    // Model client serves both completions and embeddings
    let model = Arc::new(OpenAiClient::new(LlmConfig::from_env()?)?);

    let provider = NeonClient::new(ProviderConfig::from_env()?)?;
    let provisioner = TenantProvisioner::new(Arc::new(provider), Arc::new(PgSchemaInitializer));
    let registry = TenantRegistry::new(Arc::new(provisioner), config.tenant_cache_size);

    let admin_kb = match &config.admin_kb_database_url {
        Some(url) => {
            let db = Database::connect(url).await?;
            let applied = db.initialize_schema().await?;
            info!(applied, "Admin knowledge base ready");
            Some(db)
        }
        None => {
            info!("No admin knowledge base configured");
            None
        }
    };

    let state = AppState {
        registry: Arc::new(registry),
        completion: model.clone(),
        embedder: model,
        admin_kb,
        rag: rag_config,
        api_token: config.api_token.clone(),
    };

    let app = routes::router().with_state(state);

    info!(addr = %config.addr, "RAG API listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}
