//! In-memory collaborators for unit tests.

use crate::error::{Result, ScrapeError};
use crate::{
    ClientFactory, GetMetricStatisticsRequest, ListMetricsRequest, MetricDescriptor,
    MonitoringApi, TaggingApi,
};
use cwexporter_common::jobs::{DiscoveryJob, MetricSpec};
use cwexporter_common::types::{Datapoint, Dimension, DiscoveredResource, Tag};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Tracks current and peak concurrency of a call site.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

pub(crate) struct InFlightGuard<'a>(&'a InFlight);

impl InFlight {
    pub(crate) fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(self)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct MockMonitoring {
    /// Metric names whose datapoint fetch fails
    pub failing_metrics: HashSet<String>,
    /// Metric names whose list call fails
    pub failing_lists: HashSet<String>,
    /// Concrete streams returned per list call
    pub instances_per_list: usize,
    pub delay: Duration,
    /// Shared by list and fetch calls, both draw from the metrics gate
    pub calls: InFlight,
    pub requests: Mutex<Vec<GetMetricStatisticsRequest>>,
}

impl MockMonitoring {
    pub(crate) fn new() -> Self {
        Self {
            instances_per_list: 1,
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl MonitoringApi for MockMonitoring {
    async fn list_metrics(&self, request: &ListMetricsRequest) -> Result<Vec<MetricDescriptor>> {
        let _guard = self.calls.enter();
        tokio::time::sleep(self.delay).await;

        if self.failing_lists.contains(&request.metric_name) {
            return Err(ScrapeError::monitoring("ListMetrics", "list unavailable"));
        }

        let concrete: Vec<Dimension> = request
            .dimensions
            .iter()
            .map(|d| Dimension::new(d.name.as_str(), d.value.clone().unwrap_or_default()))
            .collect();

        Ok((0..self.instances_per_list)
            .map(|i| {
                let mut dimensions = concrete.clone();
                if self.instances_per_list > 1 {
                    dimensions.push(Dimension::new("Instance", i.to_string()));
                }
                MetricDescriptor {
                    namespace: request.namespace.clone(),
                    metric_name: request.metric_name.clone(),
                    dimensions,
                }
            })
            .collect())
    }

    async fn get_metric_statistics(
        &self,
        request: &GetMetricStatisticsRequest,
    ) -> Result<Vec<Datapoint>> {
        let _guard = self.calls.enter();
        tokio::time::sleep(self.delay).await;
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        if self.failing_metrics.contains(&request.metric_name) {
            return Err(ScrapeError::monitoring("GetMetricStatistics", "throttled"));
        }

        let mut point = Datapoint::empty_at(request.end_time);
        point.average = Some(1.0);
        Ok(vec![point])
    }
}

#[derive(Default)]
pub(crate) struct MockTagging {
    pub resources: Vec<DiscoveredResource>,
    /// Service types whose discovery fails
    pub failing_services: HashSet<String>,
    pub delay: Duration,
    pub calls: InFlight,
}

#[async_trait::async_trait]
impl TaggingApi for MockTagging {
    async fn get_resources(&self, job: &DiscoveryJob) -> Result<Vec<DiscoveredResource>> {
        let _guard = self.calls.enter();
        tokio::time::sleep(self.delay).await;

        if self.failing_services.contains(&job.service_type) {
            return Err(ScrapeError::Discovery {
                service: job.service_type.clone(),
                region: job.region.clone(),
                message: "AccessDenied".to_string(),
            });
        }

        Ok(self
            .resources
            .iter()
            .filter(|r| r.service == job.service_type && r.region == job.region)
            .cloned()
            .collect())
    }
}

pub(crate) struct MockFactory {
    pub monitoring: Arc<MockMonitoring>,
    pub tagging: Arc<MockTagging>,
    /// Regions where client construction fails
    pub failing_regions: HashSet<String>,
}

impl MockFactory {
    fn check_region(&self, region: &str) -> Result<()> {
        if self.failing_regions.contains(region) {
            return Err(ScrapeError::ClientSetup {
                region: region.to_string(),
                message: "no credentials".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ClientFactory for MockFactory {
    async fn monitoring(
        &self,
        region: &str,
        _role_arn: Option<&str>,
    ) -> Result<Arc<dyn MonitoringApi>> {
        self.check_region(region)?;
        Ok(self.monitoring.clone())
    }

    async fn tagging(&self, region: &str, _role_arn: Option<&str>) -> Result<Arc<dyn TaggingApi>> {
        self.check_region(region)?;
        Ok(self.tagging.clone())
    }
}

pub(crate) fn metric_spec(name: &str) -> MetricSpec {
    MetricSpec {
        name: name.to_string(),
        statistics: vec!["Average".to_string()],
        nil_to_zero: false,
        add_cloudwatch_timestamp: false,
        additional_dimensions: vec![],
        period_secs: 300,
        length_secs: 300,
        delay_secs: 0,
    }
}

pub(crate) fn ec2_instance(id: &str, region: &str, tags: &[(&str, &str)]) -> DiscoveredResource {
    DiscoveredResource {
        id: format!("arn:aws:ec2:{region}:123456789012:instance/{id}"),
        service: "ec2".to_string(),
        region: region.to_string(),
        tags: tags.iter().map(|(k, v)| Tag::new(*k, *v)).collect(),
    }
}

pub(crate) fn discovery_job(service: &str, region: &str, metrics: &[&str]) -> DiscoveryJob {
    DiscoveryJob {
        region: region.to_string(),
        role_arn: None,
        service_type: service.to_string(),
        search_tags: vec![],
        aws_dimensions: vec![],
        custom_tags: vec![],
        metrics: metrics.iter().map(|m| metric_spec(m)).collect(),
    }
}
