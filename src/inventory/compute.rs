//! Compute Collector
//!
//! Lists compute instances across all zones via the aggregated listing
//! endpoint, flattening the zone-keyed grouping into one ordered sequence.
//! A response without `items`, or a zone entry without `instances`, means
//! zero instances rather than an error.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::auth::ImpersonatedCaller;

use super::types::{CollectorError, InstanceRecord};

const COMPUTE_API: &str = "https://compute.googleapis.com/compute/v1";

#[derive(Debug, Deserialize)]
struct AggregatedListResponse {
    /// Zone-keyed grouping of instances. Flattened in key order, which is
    /// deterministic for a given response.
    #[serde(default)]
    items: BTreeMap<String, InstancesScopedList>,
}

#[derive(Debug, Default, Deserialize)]
struct InstancesScopedList {
    #[serde(default)]
    instances: Vec<InstanceDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceDto {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    zone: String,
    #[serde(default)]
    machine_type: String,
    #[serde(default)]
    status: Option<String>,
}

impl From<InstanceDto> for InstanceRecord {
    fn from(dto: InstanceDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            zone: path_tail(&dto.zone).to_string(),
            machine_type: path_tail(&dto.machine_type).to_string(),
            status: dto.status,
        }
    }
}

/// Final segment of a `/`-separated resource path. Full resource paths like
/// `.../zones/us-central1-a` reduce to `us-central1-a`; a path without
/// separators is returned unchanged.
pub(crate) fn path_tail(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Lists compute instances for one tenant.
pub struct ComputeCollector {
    http: reqwest::Client,
    caller: Arc<ImpersonatedCaller>,
}

impl ComputeCollector {
    pub fn new(http: reqwest::Client, caller: Arc<ImpersonatedCaller>) -> Self {
        Self { http, caller }
    }

    pub async fn collect(&self, project_id: &str) -> Result<Vec<InstanceRecord>, CollectorError> {
        let token = self.caller.token().await?;

        let url = format!("{COMPUTE_API}/projects/{project_id}/aggregated/instances");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| CollectorError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::from_status(status));
        }

        let body: AggregatedListResponse = response
            .json()
            .await
            .map_err(|e| CollectorError::Malformed(e.to_string()))?;

        let records = flatten_aggregated(body);
        debug!("found {} compute instances in {}", records.len(), project_id);
        Ok(records)
    }
}

fn flatten_aggregated(response: AggregatedListResponse) -> Vec<InstanceRecord> {
    response
        .items
        .into_values()
        .flat_map(|scoped| scoped.instances)
        .map(InstanceRecord::from)
        .collect()
}
