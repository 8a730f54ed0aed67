//! Tenant Discovery
//!
//! Lists every project reachable under the impersonated identity via the
//! Cloud Resource Manager API. Only project identifiers are returned; no
//! other project metadata is needed downstream. An empty listing is a valid
//! terminal state, not an error.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::auth::ImpersonatedCaller;

const RESOURCE_MANAGER_API: &str = "https://cloudresourcemanager.googleapis.com/v1";

/// Discovery failures. The orchestrator degrades any of these to an empty
/// tenant set rather than aborting the run.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("project listing rejected: {0}")]
    AuthRejected(String),

    #[error("resource manager unreachable: {0}")]
    Network(String),

    #[error("malformed project listing: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListProjectsResponse {
    #[serde(default)]
    projects: Vec<ProjectDto>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectDto {
    project_id: String,
}

/// List the project ids the caller can access, following continuation
/// tokens until the listing is exhausted.
pub async fn list_tenants(
    http: &reqwest::Client,
    caller: &ImpersonatedCaller,
) -> Result<Vec<String>, DiscoveryError> {
    let token = caller
        .token()
        .await
        .map_err(|e| DiscoveryError::AuthRejected(e.to_string()))?;

    let url = format!("{RESOURCE_MANAGER_API}/projects");
    let mut tenants = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let mut request = http.get(&url).bearer_auth(&token);
        if let Some(page) = &page_token {
            request = request.query(&[("pageToken", page.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DiscoveryError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DiscoveryError::AuthRejected(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(DiscoveryError::Network(format!("unexpected status {status}")));
        }

        let page: ListProjectsResponse = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Malformed(e.to_string()))?;

        tenants.extend(page.projects.into_iter().map(|p| p.project_id));

        match page.next_page_token {
            Some(next) if !next.is_empty() => page_token = Some(next),
            _ => break,
        }
    }

    debug!("discovered {} accessible projects", tenants.len());
    Ok(tenants)
}
