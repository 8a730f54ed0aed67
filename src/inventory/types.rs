//! Inventory Report Types
//!
//! Normalized record shapes produced by the collectors and the aggregate
//! per-tenant report. All records are immutable once built; serialization
//! uses the camelCase wire contract of the HTTP envelope.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;

/// Collector failures. Never propagated past the orchestrator boundary;
/// each one degrades to an empty slot in the report plus a warning.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    #[error("upstream unreachable: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl CollectorError {
    pub(crate) fn from_status(status: StatusCode) -> Self {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Self::AuthRejected(format!("status {status}"))
        } else {
            Self::Network(format!("unexpected status {status}"))
        }
    }
}

impl From<AuthError> for CollectorError {
    fn from(e: AuthError) -> Self {
        Self::AuthRejected(e.to_string())
    }
}

/// A compute instance, with zone and machine type reduced to their final
/// resource-path segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub id: String,
    pub name: String,
    pub zone: String,
    pub machine_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A cloud asset with its opaque resource metadata blob.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub name: String,
    pub asset_type: String,
    pub resource: serde_json::Value,
}

/// A metric descriptor discovered for a tenant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDescriptor {
    #[serde(rename = "type")]
    pub metric_type: String,
    pub display_name: String,
    pub description: String,
}

/// One sampled point of a time series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// A fetched time series over a half-open interval `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub metric_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub points: Vec<MetricPoint>,
}

/// Sampled series for the one representative instance of a tenant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceMetrics {
    pub instance_name: String,
    pub instance_id: String,
    pub cpu: MetricSample,
    pub memory: MetricSample,
}

/// Aggregate of one tenant's collector outputs. Any slot may be empty when
/// its collector failed; a failed collector never suppresses the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantReport {
    pub project_id: String,
    pub instances: Vec<InstanceRecord>,
    pub assets: Vec<AssetRecord>,
    pub metrics: Vec<MetricDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_metrics: Option<InstanceMetrics>,
}

/// Terminal output of a full inventory run: reports in tenant discovery
/// order plus the non-fatal degradations observed along the way.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRun {
    pub reports: Vec<TenantReport>,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn report_serializes_with_wire_field_names() {
        let report = TenantReport {
            project_id: "proj-1".to_string(),
            instances: vec![InstanceRecord {
                id: "42".to_string(),
                name: "vm-a".to_string(),
                zone: "us-central1-a".to_string(),
                machine_type: "e2-medium".to_string(),
                status: Some("RUNNING".to_string()),
            }],
            assets: Vec::new(),
            metrics: vec![MetricDescriptor {
                metric_type: "compute.googleapis.com/instance/cpu/utilization".to_string(),
                display_name: "CPU utilization".to_string(),
                description: String::new(),
            }],
            instance_metrics: None,
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["projectId"], "proj-1");
        assert_eq!(value["instances"][0]["machineType"], "e2-medium");
        assert_eq!(
            value["metrics"][0]["type"],
            "compute.googleapis.com/instance/cpu/utilization"
        );
        // Absent sample metrics are omitted entirely, not null.
        assert!(value.get("instanceMetrics").is_none());
    }

    #[test]
    fn auth_failures_map_to_rejected_collector_errors() {
        let err = CollectorError::from(AuthError::Network("timeout".to_string()));
        assert!(matches!(err, CollectorError::AuthRejected(_)));

        assert!(matches!(
            CollectorError::from_status(StatusCode::FORBIDDEN),
            CollectorError::AuthRejected(_)
        ));
        assert!(matches!(
            CollectorError::from_status(StatusCode::BAD_GATEWAY),
            CollectorError::Network(_)
        ));
    }

    #[test]
    fn asset_record_keeps_resource_blob_opaque() {
        let record = AssetRecord {
            name: "//compute.googleapis.com/projects/p/zones/z/instances/i".to_string(),
            asset_type: "compute.googleapis.com/Instance".to_string(),
            resource: json!({"data": {"labels": {"env": "prod"}}}),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["assetType"], "compute.googleapis.com/Instance");
        assert_eq!(value["resource"]["data"]["labels"]["env"], "prod");
    }
}
