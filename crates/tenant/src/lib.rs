//! Tenant database provisioning.
//!
//! Every authenticated user owns an isolated Postgres database, hosted as a
//! project named `user-<id>` on a Neon-compatible provisioning API. The first
//! access creates the project and bootstraps its schema. Later accesses only
//! look the project up and return its connection string.
//!
//! - [`NeonClient`] speaks the provider HTTP API.
//! - [`TenantProvisioner`] implements the look-up-or-create flow.
//! - [`TenantRegistry`] caches one connection pool per tenant.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rag_core::UserSession;
//! use tenant::{
//!     NeonClient, PgSchemaInitializer, ProviderConfig, TenantProvisioner, TenantRegistry,
//! };
//!
//! # async fn run() -> Result<(), tenant::TenantError> {
//! let api = NeonClient::new(ProviderConfig::from_env()?)?;
//! let provisioner = TenantProvisioner::new(Arc::new(api), Arc::new(PgSchemaInitializer));
//! let registry = TenantRegistry::new(Arc::new(provisioner), 256);
//!
//! let db = registry.database(&UserSession::user("a1b2c3")).await?;
//! # let _ = db;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod neon;
mod provisioner;
mod registry;

pub use config::{ProviderConfig, ProviderConfigBuilder};
pub use error::{Result, TenantError};
pub use neon::{NeonClient, Project, ProvisioningApi};
pub use provisioner::{
    project_name, ConnectionResolver, PgSchemaInitializer, SchemaInitializer, TenantProvisioner,
};
pub use registry::{TenantRegistry, DEFAULT_MAX_TENANTS};
