//! Asset Collector
//!
//! Lists cloud assets for a tenant, restricted to a fixed allow-list of
//! asset types and resource-metadata content only (no IAM policy content).
//! Continuation tokens are followed until the listing is exhausted; stopping
//! early would silently under-report.

use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::auth::ImpersonatedCaller;

use super::types::{AssetRecord, CollectorError};

const ASSET_API: &str = "https://cloudasset.googleapis.com/v1";

/// Asset types inventoried for every tenant.
pub const ASSET_TYPES: [&str; 4] = [
    "compute.googleapis.com/Instance",
    "storage.googleapis.com/Bucket",
    "bigquery.googleapis.com/Dataset",
    "bigquery.googleapis.com/Table",
];

/// Resource metadata only; IAM policy content is never requested.
const CONTENT_TYPE: &str = "RESOURCE";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListAssetsResponse {
    #[serde(default)]
    assets: Vec<AssetDto>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetDto {
    #[serde(default)]
    name: String,
    #[serde(default)]
    asset_type: String,
    #[serde(default)]
    resource: serde_json::Value,
}

impl From<AssetDto> for AssetRecord {
    fn from(dto: AssetDto) -> Self {
        Self {
            name: dto.name,
            asset_type: dto.asset_type,
            resource: dto.resource,
        }
    }
}

fn page_query(page_token: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query: Vec<(&'static str, String)> = ASSET_TYPES
        .iter()
        .map(|t| ("assetTypes", (*t).to_string()))
        .collect();
    query.push(("contentType", CONTENT_TYPE.to_string()));
    if let Some(token) = page_token {
        query.push(("pageToken", token.to_string()));
    }
    query
}

/// Lists cloud assets for one tenant.
pub struct AssetCollector {
    http: reqwest::Client,
    caller: Arc<ImpersonatedCaller>,
}

impl AssetCollector {
    pub fn new(http: reqwest::Client, caller: Arc<ImpersonatedCaller>) -> Self {
        Self { http, caller }
    }

    pub async fn collect(&self, project_id: &str) -> Result<Vec<AssetRecord>, CollectorError> {
        let token = self.caller.token().await?;

        let url = format!("{ASSET_API}/projects/{project_id}/assets");
        let mut assets = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let response = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .query(&page_query(page_token.as_deref()))
                .send()
                .await
                .map_err(|e| CollectorError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(CollectorError::from_status(status));
            }

            let page: ListAssetsResponse = response
                .json()
                .await
                .map_err(|e| CollectorError::Malformed(e.to_string()))?;

            assets.extend(page.assets.into_iter().map(AssetRecord::from));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        debug!("found {} assets in {}", assets.len(), project_id);
        Ok(assets)
    }
}
