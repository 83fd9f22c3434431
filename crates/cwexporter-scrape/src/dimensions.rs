use crate::error::{Result, ScrapeError};
use crate::services::{ResourceArn, ServiceRegistry};
use crate::{GetMetricStatisticsRequest, ListMetricsRequest};
use chrono::{DateTime, Duration, Utc};
use cwexporter_common::jobs::{DiscoveryJob, MetricSpec};
use cwexporter_common::types::Dimension;

const STANDARD_STATISTICS: [&str; 5] = ["Average", "Sum", "Minimum", "Maximum", "SampleCount"];

/// Dimensions identifying `resource_arn` for its service type.
pub fn detect_dimensions_by_service(
    registry: &ServiceRegistry,
    service: &str,
    resource_arn: &str,
) -> Result<Vec<Dimension>> {
    let definition = registry
        .get(service)
        .ok_or_else(|| ScrapeError::UnknownService(service.to_string()))?;
    let arn = ResourceArn::parse(resource_arn)?;
    definition.detector.detect(&arn)
}

/// Job-level dimension names as name-only filters.
pub fn job_dimensions(job: &DiscoveryJob) -> Vec<Dimension> {
    job.aws_dimensions
        .iter()
        .map(|name| Dimension::name_only(name.as_str()))
        .collect()
}

/// Appends `extra` to `base`. Duplicates are kept.
pub fn add_additional_dimensions(base: &[Dimension], extra: &[Dimension]) -> Vec<Dimension> {
    let mut dimensions = Vec::with_capacity(base.len() + extra.len());
    dimensions.extend_from_slice(base);
    dimensions.extend_from_slice(extra);
    dimensions
}

/// Label used for static jobs: the namespace without its "AWS/" prefix.
///
/// ```
/// use cwexporter_scrape::dimensions::static_service_label;
///
/// assert_eq!(static_service_label("AWS/EC2"), "EC2");
/// assert_eq!(static_service_label("Custom/App"), "Custom/App");
/// ```
pub fn static_service_label(namespace: &str) -> String {
    namespace
        .strip_prefix("AWS/")
        .unwrap_or(namespace)
        .to_string()
}

pub fn is_standard_statistic(statistic: &str) -> bool {
    STANDARD_STATISTICS.contains(&statistic)
}

pub fn build_list_request(
    dimensions: &[Dimension],
    namespace: &str,
    metric: &MetricSpec,
) -> ListMetricsRequest {
    ListMetricsRequest {
        namespace: namespace.to_string(),
        metric_name: metric.name.clone(),
        dimensions: dimensions.to_vec(),
    }
}

/// Datapoint query for `metric` covering `[now - delay - length, now - delay]`.
pub fn build_statistics_request(
    dimensions: &[Dimension],
    namespace: &str,
    metric: &MetricSpec,
    now: DateTime<Utc>,
) -> GetMetricStatisticsRequest {
    let end_time = now - Duration::seconds(i64::from(metric.delay_secs));
    let start_time = end_time - Duration::seconds(i64::from(metric.length_secs));

    let (statistics, extended_statistics): (Vec<String>, Vec<String>) = metric
        .statistics
        .iter()
        .cloned()
        .partition(|s| is_standard_statistic(s));

    GetMetricStatisticsRequest {
        namespace: namespace.to_string(),
        metric_name: metric.name.clone(),
        dimensions: dimensions.to_vec(),
        start_time,
        end_time,
        period_secs: metric.period_secs,
        statistics,
        extended_statistics,
    }
}
