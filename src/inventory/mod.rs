//! Resource Inventory
//!
//! Three side-by-side collectors (compute, asset, metric), the per-tenant
//! catalog seam they plug into, and the orchestrator that aggregates them
//! into per-tenant reports.

mod assets;
mod compute;
mod metrics;
mod orchestrator;
mod types;

pub use assets::{AssetCollector, ASSET_TYPES};
pub use compute::ComputeCollector;
pub use metrics::{MetricCollector, CPU_METRIC, MEMORY_METRIC};
pub use orchestrator::{
    collect_all, run_asset_inventory, run_inventory, CollectOptions, SampleStrategy,
    MAX_DESCRIPTORS,
};
pub use types::{
    AssetRecord, CollectorError, InstanceMetrics, InstanceRecord, InventoryRun, MetricDescriptor,
    MetricPoint, MetricSample, TenantReport,
};

use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::ImpersonatedCaller;

/// Per-tenant resource surfaces queried during aggregation. A seam between
/// the orchestrator and the API-backed collectors, so aggregation behavior
/// is testable with deterministic fixtures.
#[async_trait]
pub trait TenantInventory: Send + Sync {
    async fn instances(&self, project_id: &str) -> Result<Vec<InstanceRecord>, CollectorError>;

    async fn assets(&self, project_id: &str) -> Result<Vec<AssetRecord>, CollectorError>;

    async fn metric_descriptors(
        &self,
        project_id: &str,
    ) -> Result<Vec<MetricDescriptor>, CollectorError>;

    async fn instance_metrics(
        &self,
        project_id: &str,
        instance: &InstanceRecord,
    ) -> Result<InstanceMetrics, CollectorError>;
}

/// The production catalog: one collector per Google API surface, all
/// sharing the same authenticated caller.
pub struct GcpCatalog {
    compute: ComputeCollector,
    assets: AssetCollector,
    metrics: MetricCollector,
}

impl GcpCatalog {
    pub fn new(http: reqwest::Client, caller: Arc<ImpersonatedCaller>) -> Self {
        Self {
            compute: ComputeCollector::new(http.clone(), caller.clone()),
            assets: AssetCollector::new(http.clone(), caller.clone()),
            metrics: MetricCollector::new(http, caller),
        }
    }
}

#[async_trait]
impl TenantInventory for GcpCatalog {
    async fn instances(&self, project_id: &str) -> Result<Vec<InstanceRecord>, CollectorError> {
        self.compute.collect(project_id).await
    }

    async fn assets(&self, project_id: &str) -> Result<Vec<AssetRecord>, CollectorError> {
        self.assets.collect(project_id).await
    }

    async fn metric_descriptors(
        &self,
        project_id: &str,
    ) -> Result<Vec<MetricDescriptor>, CollectorError> {
        self.metrics.descriptors(project_id).await
    }

    async fn instance_metrics(
        &self,
        project_id: &str,
        instance: &InstanceRecord,
    ) -> Result<InstanceMetrics, CollectorError> {
        self.metrics.instance_series(project_id, instance).await
    }
}
