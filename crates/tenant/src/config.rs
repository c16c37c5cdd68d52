//! Provisioning provider configuration.

use std::env;

use crate::error::{Result, TenantError};

/// Configuration for [`NeonClient`](crate::NeonClient).
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the provider API.
    pub api_url: String,

    /// Bearer token for the provider API.
    pub api_key: String,

    /// Postgres major version for new projects.
    pub pg_version: u32,

    /// Database name used in tenant connection strings.
    pub database_name: String,

    /// Role name used in tenant connection strings.
    pub role_name: String,

    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: "https://console.neon.tech/api/v2".to_string(),
            api_key: String::new(),
            pg_version: 16,
            database_name: "neondb".to_string(),
            role_name: "neondb_owner".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl ProviderConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `NEON_API_KEY` - provider API key
    ///
    /// Optional environment variables:
    /// - `NEON_API_URL` - API base URL (default: https://console.neon.tech/api/v2)
    /// - `NEON_PG_VERSION` - Postgres version for new projects (default: 16)
    /// - `NEON_DATABASE_NAME` - database name (default: neondb)
    /// - `NEON_ROLE_NAME` - role name (default: neondb_owner)
    /// - `NEON_TIMEOUT_SECS` - request timeout (default: 60)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let api_key = env::var("NEON_API_KEY")
            .map_err(|_| TenantError::Configuration("NEON_API_KEY not set".to_string()))?;

        let pg_version = match env::var("NEON_PG_VERSION") {
            Ok(v) => v.parse().map_err(|_| {
                TenantError::Configuration(format!("NEON_PG_VERSION is not a number: {}", v))
            })?,
            Err(_) => defaults.pg_version,
        };

        Ok(Self {
            api_url: env::var("NEON_API_URL").unwrap_or(defaults.api_url),
            api_key,
            pg_version,
            database_name: env::var("NEON_DATABASE_NAME").unwrap_or(defaults.database_name),
            role_name: env::var("NEON_ROLE_NAME").unwrap_or(defaults.role_name),
            request_timeout_secs: env::var("NEON_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),
        })
    }

    /// Create a new config builder.
    pub fn builder() -> ProviderConfigBuilder {
        ProviderConfigBuilder::default()
    }
}

/// Builder for ProviderConfig.
#[derive(Debug, Default)]
pub struct ProviderConfigBuilder {
    config: ProviderConfig,
}

impl ProviderConfigBuilder {
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn pg_version(mut self, version: u32) -> Self {
        self.config.pg_version = version;
        self
    }

    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.config.database_name = name.into();
        self
    }

    pub fn role_name(mut self, name: impl Into<String>) -> Self {
        self.config.role_name = name.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn build(self) -> ProviderConfig {
        self.config
    }
}
