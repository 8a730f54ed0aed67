//! Metric Collector
//!
//! Lists metric descriptors for a tenant and fetches two fixed time series
//! (CPU utilization and memory usage) for one representative instance over
//! a trailing one-hour window. Descriptor truncation is the orchestrator's
//! sampling policy, not this collector's; the full list is returned here.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::auth::ImpersonatedCaller;

use super::types::{CollectorError, InstanceMetrics, InstanceRecord, MetricDescriptor, MetricPoint, MetricSample};

const MONITORING_API: &str = "https://monitoring.googleapis.com/v3";

pub const CPU_METRIC: &str = "compute.googleapis.com/instance/cpu/utilization";
pub const MEMORY_METRIC: &str = "compute.googleapis.com/instance/memory/usage";

/// Trailing window sampled for instance series.
const SAMPLE_WINDOW_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDescriptorsResponse {
    #[serde(default)]
    metric_descriptors: Vec<DescriptorDto>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptorDto {
    #[serde(rename = "type")]
    metric_type: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    description: String,
}

impl From<DescriptorDto> for MetricDescriptor {
    fn from(dto: DescriptorDto) -> Self {
        Self {
            metric_type: dto.metric_type,
            display_name: dto.display_name,
            description: dto.description,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTimeSeriesResponse {
    #[serde(default)]
    time_series: Vec<TimeSeriesDto>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesDto {
    #[serde(default)]
    points: Vec<PointDto>,
}

#[derive(Debug, Deserialize)]
struct PointDto {
    interval: PointIntervalDto,
    value: PointValueDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointIntervalDto {
    end_time: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointValueDto {
    double_value: Option<f64>,
    // The monitoring API encodes 64-bit integers as strings.
    int64_value: Option<String>,
}

/// Filter predicate combining metric type and resource-label equality.
fn series_filter(metric_type: &str, instance_id: &str) -> String {
    format!(r#"metric.type="{metric_type}" AND resource.labels.instance_id="{instance_id}""#)
}

/// Half-open `[start, end)` trailing sample window ending at `end`.
fn sample_window(end: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (end - chrono::Duration::seconds(SAMPLE_WINDOW_SECS), end)
}

fn point_value(dto: PointDto) -> Option<MetricPoint> {
    let value = dto
        .value
        .double_value
        .or_else(|| dto.value.int64_value.as_deref().and_then(|v| v.parse().ok()))?;
    Some(MetricPoint {
        timestamp: dto.interval.end_time,
        value,
    })
}

/// Lists metric descriptors and fetches instance time series for one tenant.
pub struct MetricCollector {
    http: reqwest::Client,
    caller: Arc<ImpersonatedCaller>,
}

impl MetricCollector {
    pub fn new(http: reqwest::Client, caller: Arc<ImpersonatedCaller>) -> Self {
        Self { http, caller }
    }

    /// Full descriptor listing for the tenant, following continuation
    /// tokens until exhausted.
    pub async fn descriptors(&self, project_id: &str) -> Result<Vec<MetricDescriptor>, CollectorError> {
        let token = self.caller.token().await?;

        let url = format!("{MONITORING_API}/projects/{project_id}/metricDescriptors");
        let mut descriptors = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(&url).bearer_auth(&token);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| CollectorError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(CollectorError::from_status(status));
            }

            let page: ListDescriptorsResponse = response
                .json()
                .await
                .map_err(|e| CollectorError::Malformed(e.to_string()))?;

            descriptors.extend(page.metric_descriptors.into_iter().map(MetricDescriptor::from));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        debug!("found {} metric descriptors in {}", descriptors.len(), project_id);
        Ok(descriptors)
    }

    /// CPU and memory series for one representative instance over the
    /// trailing window ending now.
    pub async fn instance_series(
        &self,
        project_id: &str,
        instance: &InstanceRecord,
    ) -> Result<InstanceMetrics, CollectorError> {
        let (start, end) = sample_window(Utc::now());

        let cpu = self
            .time_series(project_id, CPU_METRIC, &instance.id, start, end)
            .await?;
        let memory = self
            .time_series(project_id, MEMORY_METRIC, &instance.id, start, end)
            .await?;

        Ok(InstanceMetrics {
            instance_name: instance.name.clone(),
            instance_id: instance.id.clone(),
            cpu,
            memory,
        })
    }

    async fn time_series(
        &self,
        project_id: &str,
        metric_type: &str,
        instance_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<MetricSample, CollectorError> {
        let token = self.caller.token().await?;

        let filter = series_filter(metric_type, instance_id);
        let start_rfc3339 = start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end_rfc3339 = end.to_rfc3339_opts(SecondsFormat::Secs, true);

        let url = format!("{MONITORING_API}/projects/{project_id}/timeSeries");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(&[
                ("filter", filter.as_str()),
                ("interval.startTime", start_rfc3339.as_str()),
                ("interval.endTime", end_rfc3339.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CollectorError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::from_status(status));
        }

        let body: ListTimeSeriesResponse = response
            .json()
            .await
            .map_err(|e| CollectorError::Malformed(e.to_string()))?;

        let points = body
            .time_series
            .into_iter()
            .flat_map(|series| series.points)
            .filter_map(point_value)
            .collect();

        Ok(MetricSample {
            metric_type: metric_type.to_string(),
            start_time: start,
            end_time: end,
            points,
        })
    }
}
