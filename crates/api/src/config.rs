//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;

use tenant::DEFAULT_MAX_TENANTS;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// Bearer token required on every request, if set.
    pub api_token: Option<String>,
    /// Shared admin knowledge-base database, if any.
    pub admin_kb_database_url: Option<String>,
    /// Maximum number of tenant pools kept open.
    pub tenant_cache_size: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `API_ADDR` | Server bind address | `127.0.0.1:8790` |
    /// | `API_TOKEN` | Required bearer token | (none) |
    /// | `ADMIN_KB_DATABASE_URL` | Admin knowledge-base Postgres URL | (none) |
    /// | `TENANT_CACHE_SIZE` | Open tenant pools | `256` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("API_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8790".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let api_token = non_empty(env::var("API_TOKEN").ok());
        let admin_kb_database_url = non_empty(env::var("ADMIN_KB_DATABASE_URL").ok());

        let tenant_cache_size = match env::var("TENANT_CACHE_SIZE") {
            Ok(v) => match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidCacheSize(v)),
            },
            Err(_) => DEFAULT_MAX_TENANTS,
        };

        Ok(Self {
            addr,
            api_token,
            admin_kb_database_url,
            tenant_cache_size,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid API_ADDR format")]
    InvalidAddr,

    #[error("TENANT_CACHE_SIZE must be a positive integer, got {0:?}")]
    InvalidCacheSize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("tok".to_string())), Some("tok".to_string()));
    }
}
