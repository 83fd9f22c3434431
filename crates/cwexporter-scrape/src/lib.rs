//! Scrape orchestration for the cwexporter.
//!
//! A scrape cycle turns a [`ScrapeConfig`](cwexporter_common::jobs::ScrapeConfig)
//! into a [`ScrapeSnapshot`](cwexporter_common::types::ScrapeSnapshot):
//! discovery jobs find resources through a [`TaggingApi`], static jobs name
//! theirs explicitly, and both fetch datapoints through a [`MonitoringApi`].
//! The [`orchestrator::Orchestrator`] runs every job concurrently while two
//! global [`gates::ScrapeGates`] cap in-flight calls to each API.

pub mod aws;
pub mod dimensions;
pub mod error;
pub mod gates;
pub mod observer;
pub mod orchestrator;
pub mod scraper;
pub mod services;
pub mod tags;

#[cfg(test)]
pub(crate) mod testing;

use chrono::{DateTime, Utc};
use cwexporter_common::jobs::DiscoveryJob;
use cwexporter_common::types::{Datapoint, Dimension, DiscoveredResource};
use error::Result;
use std::sync::Arc;

/// Enumerates concrete metric streams matching a dimension filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ListMetricsRequest {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
}

/// One concrete metric stream returned by a list call.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDescriptor {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
}

/// Datapoint query for a single metric stream.
#[derive(Debug, Clone, PartialEq)]
pub struct GetMetricStatisticsRequest {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub period_secs: u32,
    /// Standard statistics: Average, Sum, Minimum, Maximum, SampleCount
    pub statistics: Vec<String>,
    /// Percentile statistics such as "p99"
    pub extended_statistics: Vec<String>,
}

/// Monitoring API collaborator (CloudWatch).
///
/// Implementations perform their own retries; a returned error means
/// "no data for this request".
#[async_trait::async_trait]
pub trait MonitoringApi: Send + Sync {
    async fn list_metrics(&self, request: &ListMetricsRequest) -> Result<Vec<MetricDescriptor>>;

    async fn get_metric_statistics(
        &self,
        request: &GetMetricStatisticsRequest,
    ) -> Result<Vec<Datapoint>>;
}

/// Resource discovery collaborator.
#[async_trait::async_trait]
pub trait TaggingApi: Send + Sync {
    /// Returns every resource of the job's service type in the job's region,
    /// or fails as a whole.
    async fn get_resources(&self, job: &DiscoveryJob) -> Result<Vec<DiscoveredResource>>;
}

/// Auto-scaling-group lookups, which the tagging API does not cover.
#[async_trait::async_trait]
pub trait AutoScalingApi: Send + Sync {
    async fn describe_groups(&self, region: &str) -> Result<Vec<DiscoveredResource>>;
}

/// Builds per-job clients scoped to a region and an optional assumed role.
#[async_trait::async_trait]
pub trait ClientFactory: Send + Sync {
    async fn monitoring(
        &self,
        region: &str,
        role_arn: Option<&str>,
    ) -> Result<Arc<dyn MonitoringApi>>;

    async fn tagging(&self, region: &str, role_arn: Option<&str>) -> Result<Arc<dyn TaggingApi>>;
}
