//! Look-up-or-create provisioning of tenant databases.

use std::sync::Arc;

use async_trait::async_trait;
use database::Database;
use tracing::{debug, info};

use crate::error::Result;
use crate::neon::ProvisioningApi;

/// Deterministic provider project name for a user.
pub fn project_name(user_id: &str) -> String {
    format!("user-{}", user_id)
}

/// Runs the schema bootstrap against a freshly created tenant database.
#[async_trait]
pub trait SchemaInitializer: Send + Sync {
    async fn initialize(&self, connection_string: &str) -> Result<()>;
}

/// Connects with sqlx and applies the versioned schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgSchemaInitializer;

#[async_trait]
impl SchemaInitializer for PgSchemaInitializer {
    async fn initialize(&self, connection_string: &str) -> Result<()> {
        let db = Database::connect_with_pool_size(connection_string, 1).await?;
        let result = db.initialize_schema().await;
        db.close().await;
        let applied = result?;
        debug!("Applied {} migrations to new tenant database", applied);
        Ok(())
    }
}

/// Resolves a user id to the connection string of their database.
#[async_trait]
pub trait ConnectionResolver: Send + Sync {
    async fn resolve(&self, user_id: &str) -> Result<String>;
}

/// Provisions tenant databases on first access.
///
/// An existing project is returned as-is and never re-initialized. A missing
/// project is created and bootstrapped before its connection string is
/// returned. Failures surface unchanged and leave no cleanup behind; calling
/// again is safe because every schema statement is guarded.
pub struct TenantProvisioner {
    api: Arc<dyn ProvisioningApi>,
    schema: Arc<dyn SchemaInitializer>,
}

impl TenantProvisioner {
    pub fn new(api: Arc<dyn ProvisioningApi>, schema: Arc<dyn SchemaInitializer>) -> Self {
        Self { api, schema }
    }

    /// Return the tenant connection string, creating the database if needed.
    pub async fn provision(&self, user_id: &str) -> Result<String> {
        let name = project_name(user_id);

        if let Some(project) = self.api.find_project(&name).await? {
            debug!(project = %project.id, "Tenant project exists");
            return self.api.connection_uri(&project.id).await;
        }

        info!(project = %name, "Provisioning new tenant database");
        let (project, uri) = self.api.create_project(&name).await?;
        let uri = match uri {
            Some(uri) => uri,
            None => self.api.connection_uri(&project.id).await?,
        };

        self.schema.initialize(&uri).await?;
        info!(project = %project.id, "Tenant database ready");

        Ok(uri)
    }
}

#[async_trait]
impl ConnectionResolver for TenantProvisioner {
    async fn resolve(&self, user_id: &str) -> Result<String> {
        self.provision(user_id).await
    }
}
