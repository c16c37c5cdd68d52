//! Neon-compatible provisioning API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::error::{Result, TenantError};

/// Largest page the provider returns for a project listing.
const PROJECTS_PAGE_LIMIT: u32 = 400;

/// A provider project. One project hosts one tenant database.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

/// The subset of the provider API used for provisioning.
#[async_trait]
pub trait ProvisioningApi: Send + Sync {
    /// Find a project by its exact name.
    async fn find_project(&self, name: &str) -> Result<Option<Project>>;

    /// Create a project and return it with its connection string, if the
    /// provider included one in the creation response.
    async fn create_project(&self, name: &str) -> Result<(Project, Option<String>)>;

    /// Fetch the connection string for the configured database and role.
    async fn connection_uri(&self, project_id: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ProjectsResponse {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateProjectRequest<'a> {
    project: NewProject<'a>,
}

#[derive(Debug, Serialize)]
struct NewProject<'a> {
    name: &'a str,
    pg_version: u32,
}

#[derive(Debug, Deserialize)]
struct CreateProjectResponse {
    project: Project,
    #[serde(default)]
    connection_uris: Vec<ConnectionDetails>,
}

#[derive(Debug, Deserialize)]
struct ConnectionDetails {
    connection_uri: String,
}

#[derive(Debug, Deserialize)]
struct ConnectionUriResponse {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// HTTP client for the provisioning provider.
pub struct NeonClient {
    client: Client,
    config: ProviderConfig,
}

impl NeonClient {
    /// Create a new client.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(TenantError::Configuration(
                "provider API key is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        info!("Initialized NeonClient for {}", config.api_url);

        Ok(Self { client, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Accept", "application/json")
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ProviderErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        warn!("Provider request failed: {} - {}", status, message);

        Err(TenantError::Provider {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ProvisioningApi for NeonClient {
    async fn find_project(&self, name: &str) -> Result<Option<Project>> {
        let limit = PROJECTS_PAGE_LIMIT.to_string();
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        loop {
            let mut query = vec![("search", name), ("limit", limit.as_str())];
            if let Some(cursor) = cursor.as_deref() {
                query.push(("cursor", cursor));
            }
            let request = self.client.get(self.url("/projects")).query(&query);
            let response = Self::check(self.authorized(request).send().await?).await?;
            let body: ProjectsResponse = response
                .json()
                .await
                .map_err(|e| TenantError::InvalidResponse(e.to_string()))?;
            pages += 1;

            // search is a substring match, so user-1 also finds user-12
            if let Some(found) = body.projects.iter().find(|p| p.name == name) {
                debug!("Project lookup for {}: found on page {}", name, pages);
                return Ok(Some(found.clone()));
            }

            // Stop on an empty page or a cursor that did not advance.
            let next = body
                .pagination
                .and_then(|p| p.cursor)
                .filter(|c| !c.is_empty());
            match next {
                Some(next) if !body.projects.is_empty() && cursor.as_ref() != Some(&next) => {
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        debug!("Project lookup for {}: not found after {} page(s)", name, pages);
        Ok(None)
    }

    async fn create_project(&self, name: &str) -> Result<(Project, Option<String>)> {
        let body = CreateProjectRequest {
            project: NewProject {
                name,
                pg_version: self.config.pg_version,
            },
        };
        let request = self.client.post(self.url("/projects")).json(&body);
        let response = Self::check(self.authorized(request).send().await?).await?;
        let created: CreateProjectResponse = response
            .json()
            .await
            .map_err(|e| TenantError::InvalidResponse(e.to_string()))?;

        info!("Created project {} ({})", created.project.name, created.project.id);

        let uri = created
            .connection_uris
            .into_iter()
            .next()
            .map(|c| c.connection_uri);
        Ok((created.project, uri))
    }

    async fn connection_uri(&self, project_id: &str) -> Result<String> {
        let request = self
            .client
            .get(self.url(&format!("/projects/{}/connection_uri", project_id)))
            .query(&[
                ("database_name", self.config.database_name.as_str()),
                ("role_name", self.config.role_name.as_str()),
            ]);
        let response = Self::check(self.authorized(request).send().await?).await?;
        let body: ConnectionUriResponse = response
            .json()
            .await
            .map_err(|e| TenantError::InvalidResponse(e.to_string()))?;
        Ok(body.uri)
    }
}
