//! Chat-turn tuning.

use std::env;

use crate::error::{RagError, Result};

/// Retrieval settings for a chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct RagConfig {
    /// Number of documents retrieved per turn.
    pub top_n: usize,
    /// Share of `top_n` drawn from the admin knowledge base, in `[0, 1]`.
    pub admin_ratio: f32,
    /// Model override for completions. `None` uses the provider default.
    pub model: Option<String>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            admin_ratio: 0.7,
            model: None,
        }
    }
}

impl RagConfig {
    /// Create configuration from environment variables.
    ///
    /// - `RAG_TOP_N` - documents per turn (default: 10)
    /// - `RAG_ADMIN_RATIO` - admin knowledge share (default: 0.7)
    /// - `RAG_MODEL` - completion model override (default: provider default)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let top_n = match env::var("RAG_TOP_N") {
            Ok(v) => v
                .parse()
                .map_err(|_| RagError::Configuration(format!("RAG_TOP_N is not a count: {}", v)))?,
            Err(_) => defaults.top_n,
        };

        let admin_ratio = match env::var("RAG_ADMIN_RATIO") {
            Ok(v) => parse_ratio(&v)?,
            Err(_) => defaults.admin_ratio,
        };

        let model = env::var("RAG_MODEL").ok().filter(|m| !m.trim().is_empty());

        Ok(Self {
            top_n,
            admin_ratio,
            model,
        })
    }
}

/// Parse an admin ratio, rejecting values outside `[0, 1]`.
pub fn parse_ratio(value: &str) -> Result<f32> {
    let ratio: f32 = value
        .trim()
        .parse()
        .map_err(|_| RagError::Configuration(format!("ratio is not a number: {}", value)))?;
    if !(0.0..=1.0).contains(&ratio) {
        return Err(RagError::Configuration(format!(
            "ratio must be between 0 and 1, got {}",
            ratio
        )));
    }
    Ok(ratio)
}
