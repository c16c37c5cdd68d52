//! Retrieval-augmented chat turns.
//!
//! A chat turn runs in a fixed order:
//!
//! 1. resolve the caller's owner id from the [`UserSession`]
//! 2. search the admin knowledge base and the caller's documents
//! 3. redact the results into citations and persist them
//! 4. assemble the persona, the history and a context-augmented question
//! 5. open a cancellable completion stream
//!
//! Search, citation storage and completion are traits so the pipeline can
//! be driven by Postgres and an HTTP model in production and by in-memory
//! fakes in tests.
//!
//! [`UserSession`]: rag_core::UserSession

pub mod citation;
pub mod config;
pub mod conversation;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod prompt;
pub mod search;

pub use citation::{
    create_citations, find_citation_by_id, format_citations, CitationDocument, CitationStore,
    FormattedCitation, PersistedCitation, PgCitationStore,
};
pub use config::RagConfig;
pub use error::{RagError, Result};
pub use ingest::{ingest_documents, IngestChunk, IngestTarget};
pub use pipeline::{ChatTurnStream, RagPipeline};
pub use search::{
    split_budget, PgVectorSearch, SearchDocument, SearchQuery, SearchResult, SimilaritySearch,
};
