use super::api_error;
use crate::error::{Result, ScrapeError};
use crate::{GetMetricStatisticsRequest, ListMetricsRequest, MetricDescriptor, MonitoringApi};
use aws_sdk_cloudwatch::primitives::DateTime as AwsDateTime;
use aws_sdk_cloudwatch::types::{self as cw, DimensionFilter, Statistic};
use aws_sdk_cloudwatch::Client;
use chrono::{DateTime, Utc};
use cwexporter_common::types::{Datapoint, Dimension};

const SERVICE: &str = "CloudWatch";

pub struct CloudWatchClient {
    client: Client,
    region: String,
}

fn dimension_filter(dimension: &Dimension) -> Result<DimensionFilter> {
    DimensionFilter::builder()
        .name(&dimension.name)
        .set_value(dimension.value.clone())
        .build()
        .map_err(|e| ScrapeError::monitoring("ListMetrics", e))
}

fn aws_dimension(dimension: &Dimension) -> Result<cw::Dimension> {
    cw::Dimension::builder()
        .name(&dimension.name)
        .value(dimension.value.as_deref().unwrap_or_default())
        .build()
        .map_err(|e| ScrapeError::monitoring("GetMetricStatistics", e))
}

fn descriptor(metric: &cw::Metric, request: &ListMetricsRequest) -> MetricDescriptor {
    MetricDescriptor {
        namespace: metric
            .namespace()
            .unwrap_or(&request.namespace)
            .to_string(),
        metric_name: metric
            .metric_name()
            .unwrap_or(&request.metric_name)
            .to_string(),
        dimensions: metric
            .dimensions()
            .iter()
            .map(|d| Dimension::new(d.name(), d.value()))
            .collect(),
    }
}

fn to_aws_time(time: DateTime<Utc>) -> AwsDateTime {
    AwsDateTime::from_secs(time.timestamp())
}

/// Points without a timestamp cannot be ordered and are dropped.
fn datapoint(point: &cw::Datapoint) -> Option<Datapoint> {
    let timestamp = point
        .timestamp()
        .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))?;

    Some(Datapoint {
        timestamp,
        average: point.average(),
        sum: point.sum(),
        minimum: point.minimum(),
        maximum: point.maximum(),
        sample_count: point.sample_count(),
        extended: point
            .extended_statistics()
            .map(|stats| stats.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default(),
    })
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    (!values.is_empty()).then_some(values)
}

impl CloudWatchClient {
    pub fn new(client: Client, region: &str) -> Self {
        Self {
            client,
            region: region.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl MonitoringApi for CloudWatchClient {
    async fn list_metrics(&self, request: &ListMetricsRequest) -> Result<Vec<MetricDescriptor>> {
        let filters = request
            .dimensions
            .iter()
            .map(dimension_filter)
            .collect::<Result<Vec<_>>>()?;

        let mut all = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .list_metrics()
                .namespace(&request.namespace)
                .metric_name(&request.metric_name)
                .set_dimensions(Some(filters.clone()))
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| api_error(SERVICE, e))?;

            all.extend(output.metrics().iter().map(|m| descriptor(m, request)));
            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        tracing::trace!(
            region = %self.region,
            namespace = %request.namespace,
            metric = %request.metric_name,
            streams = all.len(),
            "Listed metrics"
        );
        Ok(all)
    }

    async fn get_metric_statistics(
        &self,
        request: &GetMetricStatisticsRequest,
    ) -> Result<Vec<Datapoint>> {
        let dimensions = request
            .dimensions
            .iter()
            .map(aws_dimension)
            .collect::<Result<Vec<_>>>()?;
        let statistics = request
            .statistics
            .iter()
            .map(|s| Statistic::from(s.as_str()))
            .collect();

        let output = self
            .client
            .get_metric_statistics()
            .namespace(&request.namespace)
            .metric_name(&request.metric_name)
            .set_dimensions(Some(dimensions))
            .start_time(to_aws_time(request.start_time))
            .end_time(to_aws_time(request.end_time))
            .period(i32::try_from(request.period_secs).unwrap_or(i32::MAX))
            .set_statistics(non_empty(statistics))
            .set_extended_statistics(non_empty(request.extended_statistics.clone()))
            .send()
            .await
            .map_err(|e| api_error(SERVICE, e))?;

        Ok(output.datapoints().iter().filter_map(datapoint).collect())
    }
}
