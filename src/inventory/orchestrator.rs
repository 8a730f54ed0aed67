//! Aggregation Orchestrator
//!
//! Drives one inventory run: authenticate, discover tenants, then fan out
//! the three collectors per tenant with bounded concurrency. Collector
//! failures degrade to empty report slots here, in one place; discovery
//! failures degrade to an empty tenant set. Only authentication failures
//! abort the run.

use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{authenticate, AuthError, Principal};
use crate::config::Config;
use crate::discovery::list_tenants;

use super::types::{CollectorError, InventoryRun, TenantReport};
use super::{AssetCollector, AssetRecord, GcpCatalog, TenantInventory};

/// Metric descriptor lists are capped at this many entries per report. A
/// fixed sampling bound that keeps report sizes stable; lists at or under
/// the cap pass through unchanged.
pub const MAX_DESCRIPTORS: usize = 10;

/// How the representative instance for detailed metrics is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SampleStrategy {
    /// The first instance in collection order.
    #[default]
    FirstInstance,
}

impl SampleStrategy {
    fn pick<'a>(&self, instances: &'a [super::InstanceRecord]) -> Option<&'a super::InstanceRecord> {
        match self {
            Self::FirstInstance => instances.first(),
        }
    }
}

/// Tuning knobs for the per-tenant fan-out.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Maximum number of tenants collected concurrently.
    pub tenant_concurrency: usize,
    /// Representative-instance sampling policy.
    pub sample_strategy: SampleStrategy,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            tenant_concurrency: 4,
            sample_strategy: SampleStrategy::FirstInstance,
        }
    }
}

/// Run the full pipeline: authenticate, discover, collect, aggregate.
///
/// Fatal only on authentication failure. Discovery and collector failures
/// degrade to empty data and are surfaced through `warnings`.
pub async fn run_inventory(config: &Config, http: &Client) -> Result<InventoryRun, AuthError> {
    let principal = Principal::from_key_file(&config.key_file, config.scopes.clone())?;
    let identity = config.delegated_identity();

    info!("authenticating via impersonation for {}", identity.principal);
    let caller = Arc::new(authenticate(http.clone(), principal, identity).await?);

    let mut warnings = Vec::new();
    let tenants = match list_tenants(http, &caller).await {
        Ok(tenants) => tenants,
        Err(e) => {
            warn!("tenant discovery failed: {}", e);
            warnings.push(format!("tenant discovery failed: {e}"));
            Vec::new()
        }
    };

    if tenants.is_empty() {
        info!("no accessible tenants for {}", config.target_identity);
        return Ok(InventoryRun {
            reports: Vec::new(),
            warnings,
        });
    }
    info!("discovered {} accessible tenants", tenants.len());

    let catalog = GcpCatalog::new(http.clone(), caller);
    let options = CollectOptions {
        tenant_concurrency: config.tenant_concurrency,
        ..Default::default()
    };

    let (reports, collect_warnings) = collect_all(&catalog, &tenants, &options).await;
    warnings.extend(collect_warnings);

    info!("inventory run complete: {} reports", reports.len());
    Ok(InventoryRun { reports, warnings })
}

/// Authenticate and run only the asset collector for one tenant. Collector
/// failure degrades to an empty listing, same as in the full run.
pub async fn run_asset_inventory(
    config: &Config,
    http: &Client,
    project_id: &str,
) -> Result<(Vec<AssetRecord>, Vec<String>), AuthError> {
    let principal = Principal::from_key_file(&config.key_file, config.scopes.clone())?;
    let caller = Arc::new(authenticate(http.clone(), principal, config.delegated_identity()).await?);

    let collector = AssetCollector::new(http.clone(), caller);
    match collector.collect(project_id).await {
        Ok(assets) => Ok((assets, Vec::new())),
        Err(e) => {
            warn!("asset collector failed for {}: {}", project_id, e);
            Ok((
                Vec::new(),
                vec![format!("asset collector failed for {project_id}: {e}")],
            ))
        }
    }
}

/// Collect every tenant through the bounded fan-out, preserving discovery
/// order in the output regardless of completion order.
pub async fn collect_all<C>(
    catalog: &C,
    tenants: &[String],
    options: &CollectOptions,
) -> (Vec<TenantReport>, Vec<String>)
where
    C: TenantInventory + ?Sized,
{
    let results: Vec<(TenantReport, Vec<String>)> = stream::iter(
        tenants
            .iter()
            .cloned()
            .map(|tenant| async move { collect_tenant(catalog, &tenant, options.sample_strategy).await }),
    )
    .buffered(options.tenant_concurrency.max(1))
    .collect()
    .await;

    let mut reports = Vec::with_capacity(results.len());
    let mut warnings = Vec::new();
    for (report, tenant_warnings) in results {
        reports.push(report);
        warnings.extend(tenant_warnings);
    }
    (reports, warnings)
}

/// Collect one tenant: the three collectors run concurrently into fixed
/// slots, then detailed series are sampled for one representative instance.
async fn collect_tenant<C>(
    catalog: &C,
    project_id: &str,
    strategy: SampleStrategy,
) -> (TenantReport, Vec<String>)
where
    C: TenantInventory + ?Sized,
{
    let (instances, assets, descriptors) = tokio::join!(
        catalog.instances(project_id),
        catalog.assets(project_id),
        catalog.metric_descriptors(project_id),
    );

    let mut warnings = Vec::new();
    let instances = slot_or_empty(instances, project_id, "compute", &mut warnings);
    let assets = slot_or_empty(assets, project_id, "asset", &mut warnings);
    let descriptors = slot_or_empty(descriptors, project_id, "metric", &mut warnings);

    let metrics = descriptors.into_iter().take(MAX_DESCRIPTORS).collect();

    let instance_metrics = match strategy.pick(&instances) {
        Some(instance) => match catalog.instance_metrics(project_id, instance).await {
            Ok(sampled) => Some(sampled),
            Err(e) => {
                warn!("instance metric sampling failed for {}: {}", project_id, e);
                warnings.push(format!("instance metric sampling failed for {project_id}: {e}"));
                None
            }
        },
        None => None,
    };

    let report = TenantReport {
        project_id: project_id.to_string(),
        instances,
        assets,
        metrics,
        instance_metrics,
    };
    (report, warnings)
}

/// The single conversion point of the degrade policy: a failed collector
/// becomes an empty slot plus a warning, never a failed report.
fn slot_or_empty<T>(
    result: Result<Vec<T>, CollectorError>,
    project_id: &str,
    surface: &str,
    warnings: &mut Vec<String>,
) -> Vec<T> {
    match result {
        Ok(records) => records,
        Err(e) => {
            warn!("{} collector failed for {}: {}", surface, project_id, e);
            warnings.push(format!("{surface} collector failed for {project_id}: {e}"));
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::types::{
        AssetRecord, InstanceMetrics, InstanceRecord, MetricDescriptor, MetricSample,
    };
    use crate::inventory::{CPU_METRIC, MEMORY_METRIC};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;

    fn instance(id: &str, name: &str) -> InstanceRecord {
        InstanceRecord {
            id: id.to_string(),
            name: name.to_string(),
            zone: "us-central1-a".to_string(),
            machine_type: "e2-medium".to_string(),
            status: Some("RUNNING".to_string()),
        }
    }

    fn asset(name: &str) -> AssetRecord {
        AssetRecord {
            name: name.to_string(),
            asset_type: "storage.googleapis.com/Bucket".to_string(),
            resource: serde_json::Value::Null,
        }
    }

    fn descriptor(i: usize) -> MetricDescriptor {
        MetricDescriptor {
            metric_type: format!("custom.googleapis.com/metric/{i}"),
            display_name: format!("Metric {i}"),
            description: String::new(),
        }
    }

    fn empty_sample(metric_type: &str) -> MetricSample {
        let end = Utc::now();
        MetricSample {
            metric_type: metric_type.to_string(),
            start_time: end - chrono::Duration::seconds(3600),
            end_time: end,
            points: Vec::new(),
        }
    }

    #[derive(Default, Clone)]
    struct TenantFixture {
        instances: Vec<InstanceRecord>,
        assets: Vec<AssetRecord>,
        descriptors: Vec<MetricDescriptor>,
    }

    #[derive(Default)]
    struct StubCatalog {
        fixtures: HashMap<String, TenantFixture>,
        fail_compute: bool,
        fail_assets: bool,
        fail_descriptors: bool,
        fail_samples: bool,
    }

    impl StubCatalog {
        fn with_tenant(mut self, project_id: &str, fixture: TenantFixture) -> Self {
            self.fixtures.insert(project_id.to_string(), fixture);
            self
        }

        fn fixture(&self, project_id: &str) -> TenantFixture {
            self.fixtures.get(project_id).cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl TenantInventory for StubCatalog {
        async fn instances(&self, project_id: &str) -> Result<Vec<InstanceRecord>, CollectorError> {
            if self.fail_compute {
                return Err(CollectorError::Network("connection reset".to_string()));
            }
            Ok(self.fixture(project_id).instances)
        }

        async fn assets(&self, project_id: &str) -> Result<Vec<AssetRecord>, CollectorError> {
            if self.fail_assets {
                return Err(CollectorError::AuthRejected("status 403".to_string()));
            }
            Ok(self.fixture(project_id).assets)
        }

        async fn metric_descriptors(
            &self,
            project_id: &str,
        ) -> Result<Vec<MetricDescriptor>, CollectorError> {
            if self.fail_descriptors {
                return Err(CollectorError::Malformed("truncated body".to_string()));
            }
            Ok(self.fixture(project_id).descriptors)
        }

        async fn instance_metrics(
            &self,
            _project_id: &str,
            instance: &InstanceRecord,
        ) -> Result<InstanceMetrics, CollectorError> {
            if self.fail_samples {
                return Err(CollectorError::Network("connection reset".to_string()));
            }
            Ok(InstanceMetrics {
                instance_name: instance.name.clone(),
                instance_id: instance.id.clone(),
                cpu: empty_sample(CPU_METRIC),
                memory: empty_sample(MEMORY_METRIC),
            })
        }
    }

    fn full_fixture() -> TenantFixture {
        TenantFixture {
            instances: vec![instance("1", "vm-a"), instance("2", "vm-b")],
            assets: vec![asset("bucket-a"), asset("bucket-b"), asset("bucket-c")],
            descriptors: (0..15).map(descriptor).collect(),
        }
    }

    #[tokio::test]
    async fn aggregates_one_tenant_end_to_end() {
        let catalog = StubCatalog::default().with_tenant("proj-1", full_fixture());
        let (reports, warnings) = collect_all(
            &catalog,
            &["proj-1".to_string()],
            &CollectOptions::default(),
        )
        .await;

        assert!(warnings.is_empty());
        assert_eq!(reports.len(), 1);

        let report = &reports[0];
        assert_eq!(report.project_id, "proj-1");
        assert_eq!(report.instances.len(), 2);
        assert_eq!(report.assets.len(), 3);
        assert_eq!(report.metrics.len(), MAX_DESCRIPTORS);

        // Detailed series are sampled for the first instance only.
        let sampled = report.instance_metrics.as_ref().unwrap();
        assert_eq!(sampled.instance_id, "1");
        assert_eq!(sampled.instance_name, "vm-a");
    }

    #[tokio::test]
    async fn zero_tenants_completes_with_empty_reports() {
        let catalog = StubCatalog::default();
        let (reports, warnings) = collect_all(&catalog, &[], &CollectOptions::default()).await;
        assert!(reports.is_empty());
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn partial_failure_isolation_holds_for_every_combination() {
        for mask in 0u8..8 {
            let catalog = StubCatalog {
                fail_compute: mask & 1 != 0,
                fail_assets: mask & 2 != 0,
                fail_descriptors: mask & 4 != 0,
                ..StubCatalog::default()
            }
            .with_tenant("proj-1", full_fixture());

            let (reports, warnings) = collect_all(
                &catalog,
                &["proj-1".to_string()],
                &CollectOptions::default(),
            )
            .await;

            // The report survives every failure combination.
            assert_eq!(reports.len(), 1, "mask {mask}");
            let report = &reports[0];

            assert_eq!(report.instances.is_empty(), mask & 1 != 0, "mask {mask}");
            assert_eq!(report.assets.is_empty(), mask & 2 != 0, "mask {mask}");
            assert_eq!(report.metrics.is_empty(), mask & 4 != 0, "mask {mask}");

            // Sampling follows the compute slot.
            assert_eq!(report.instance_metrics.is_none(), mask & 1 != 0, "mask {mask}");

            let expected_warnings = mask.count_ones() as usize;
            assert_eq!(warnings.len(), expected_warnings, "mask {mask}");
        }
    }

    #[tokio::test]
    async fn failed_sampling_leaves_other_slots_intact() {
        let catalog = StubCatalog {
            fail_samples: true,
            ..StubCatalog::default()
        }
        .with_tenant("proj-1", full_fixture());

        let (reports, warnings) = collect_all(
            &catalog,
            &["proj-1".to_string()],
            &CollectOptions::default(),
        )
        .await;

        let report = &reports[0];
        assert_eq!(report.instances.len(), 2);
        assert!(report.instance_metrics.is_none());
        assert_eq!(warnings.len(), 1);
    }

    #[tokio::test]
    async fn descriptor_truncation_boundary_is_exact() {
        for (count, expected) in [(9, 9), (10, 10), (11, 10)] {
            let fixture = TenantFixture {
                descriptors: (0..count).map(descriptor).collect(),
                ..TenantFixture::default()
            };
            let catalog = StubCatalog::default().with_tenant("proj-1", fixture);

            let (reports, _) = collect_all(
                &catalog,
                &["proj-1".to_string()],
                &CollectOptions::default(),
            )
            .await;

            assert_eq!(reports[0].metrics.len(), expected);
            // Truncation keeps the first entries in order.
            assert_eq!(reports[0].metrics[0], descriptor(0));
        }
    }

    #[tokio::test]
    async fn concurrent_tenants_keep_their_own_data_in_discovery_order() {
        let catalog = StubCatalog::default()
            .with_tenant(
                "proj-a",
                TenantFixture {
                    instances: vec![instance("a1", "vm-a1")],
                    assets: vec![asset("asset-a")],
                    ..TenantFixture::default()
                },
            )
            .with_tenant(
                "proj-b",
                TenantFixture {
                    instances: vec![instance("b1", "vm-b1"), instance("b2", "vm-b2")],
                    assets: Vec::new(),
                    ..TenantFixture::default()
                },
            );

        let tenants = vec!["proj-a".to_string(), "proj-b".to_string()];
        let options = CollectOptions {
            tenant_concurrency: 2,
            ..CollectOptions::default()
        };
        let (reports, _) = collect_all(&catalog, &tenants, &options).await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].project_id, "proj-a");
        assert_eq!(reports[1].project_id, "proj-b");

        // No cross-tenant leakage: each report carries its own fixtures.
        assert_eq!(reports[0].instances[0].id, "a1");
        assert_eq!(reports[0].assets[0].name, "asset-a");
        assert_eq!(reports[1].instances.len(), 2);
        assert_eq!(reports[1].instance_metrics.as_ref().unwrap().instance_id, "b1");
    }

    #[tokio::test]
    async fn no_instances_means_no_sampled_metrics() {
        let fixture = TenantFixture {
            assets: vec![asset("bucket")],
            descriptors: vec![descriptor(0)],
            ..TenantFixture::default()
        };
        let catalog = StubCatalog::default().with_tenant("proj-1", fixture);

        let (reports, warnings) = collect_all(
            &catalog,
            &["proj-1".to_string()],
            &CollectOptions::default(),
        )
        .await;

        assert!(reports[0].instance_metrics.is_none());
        assert!(warnings.is_empty());
    }
}
