//! Per-job scraping.
//!
//! Fan-out is structured as nested [`JoinSet`]s: a discovery job spawns one
//! task per (resource, metric) pair, and each of those spawns one task per
//! concrete metric stream the list call returns. Every monitoring API call
//! holds a metrics gate permit; the tagging call holds a discovery permit.

use crate::dimensions::{
    add_additional_dimensions, build_list_request, build_statistics_request,
    detect_dimensions_by_service, job_dimensions, static_service_label,
};
use crate::error::Result;
use crate::gates::ScrapeGates;
use crate::observer::ScrapeObserver;
use crate::services::ServiceRegistry;
use crate::tags::{metric_tags, TagFilter};
use crate::{
    GetMetricStatisticsRequest, ListMetricsRequest, MetricDescriptor, MonitoringApi, TaggingApi,
};
use chrono::Utc;
use cwexporter_common::jobs::{DiscoveryJob, ExportedTagsOnMetrics, MetricSpec, StaticJob};
use cwexporter_common::types::{Datapoint, Dimension, DiscoveredResource, MetricResult, Tag};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Shared, cheaply clonable state every scrape task needs.
#[derive(Clone)]
pub struct ScrapeContext {
    pub gates: ScrapeGates,
    pub registry: Arc<ServiceRegistry>,
    pub observer: Arc<dyn ScrapeObserver>,
}

/// Output of one discovery job.
#[derive(Debug, Default)]
pub struct DiscoveryOutput {
    pub resources: Vec<DiscoveredResource>,
    pub metrics: Vec<MetricResult>,
}

async fn fetch_points(
    ctx: &ScrapeContext,
    monitoring: &dyn MonitoringApi,
    request: &GetMetricStatisticsRequest,
) -> Result<Vec<Datapoint>> {
    let _permit = ctx.gates.metrics_permit().await?;
    monitoring.get_metric_statistics(request).await
}

async fn list_streams(
    ctx: &ScrapeContext,
    monitoring: &dyn MonitoringApi,
    request: &ListMetricsRequest,
) -> Result<Vec<MetricDescriptor>> {
    let _permit = ctx.gates.metrics_permit().await?;
    monitoring.list_metrics(request).await
}

/// One result per configured metric. A failed fetch still yields a result,
/// with no datapoints.
pub async fn scrape_static_job(
    ctx: &ScrapeContext,
    job: Arc<StaticJob>,
    monitoring: Arc<dyn MonitoringApi>,
) -> Vec<MetricResult> {
    let service = static_service_label(&job.namespace);
    let mut tasks = JoinSet::new();

    for metric in job.metrics.iter().cloned() {
        let ctx = ctx.clone();
        let job = job.clone();
        let monitoring = monitoring.clone();
        let service = service.clone();

        tasks.spawn(async move {
            let request =
                build_statistics_request(&job.dimensions, &job.namespace, &metric, Utc::now());
            let points = match fetch_points(&ctx, monitoring.as_ref(), &request).await {
                Ok(points) => points,
                Err(e) => {
                    ctx.observer.fetch_failed(&job.name, &metric.name, &e);
                    Vec::new()
                }
            };

            let result = MetricResult {
                id: job.name.clone(),
                metric: metric.name.clone(),
                service,
                statistics: metric.statistics.clone(),
                nil_to_zero: metric.nil_to_zero,
                add_cloudwatch_timestamp: metric.add_cloudwatch_timestamp,
                custom_tags: job.custom_tags.clone(),
                tags: Vec::new(),
                dimensions: request.dimensions,
                region: job.region.clone(),
                points,
            };
            ctx.observer.metric_fetched(&result);
            result
        });
    }

    let mut results = Vec::with_capacity(job.metrics.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => tracing::error!(job = %job.name, error = %e, "Static metric task panicked"),
        }
    }
    results
}

/// Discovers the job's resources and fetches every configured metric for
/// those passing the job's tag filter.
///
/// All discovered resources are returned, filtered or not. An invalid filter
/// or a failed discovery call fails the whole job; reporting that failure is
/// left to the caller.
pub async fn scrape_discovery_job(
    ctx: &ScrapeContext,
    job: Arc<DiscoveryJob>,
    exported: &ExportedTagsOnMetrics,
    tagging: Arc<dyn TaggingApi>,
    monitoring: Arc<dyn MonitoringApi>,
) -> Result<DiscoveryOutput> {
    let filter = TagFilter::new(&job.search_tags)?;
    let resources = discover(ctx, &job, tagging.as_ref()).await?;

    let matched: Vec<&DiscoveredResource> =
        resources.iter().filter(|r| filter.matches(r)).collect();
    ctx.observer
        .resources_discovered(&job, resources.len(), matched.len());

    let common_dimensions = job_dimensions(&job);
    let mut tasks = JoinSet::new();

    for resource in matched {
        let detected =
            match detect_dimensions_by_service(&ctx.registry, &resource.service, &resource.id) {
                Ok(dimensions) => dimensions,
                Err(e) => {
                    ctx.observer.resource_skipped(resource, &e);
                    continue;
                }
            };
        let namespace = match ctx.registry.namespace(&resource.service) {
            Ok(namespace) => namespace.to_string(),
            Err(e) => {
                ctx.observer.resource_skipped(resource, &e);
                continue;
            }
        };

        let base = add_additional_dimensions(&detected, &common_dimensions);
        let target = Arc::new(ResourceTarget {
            id: resource.id.clone(),
            service: resource.service.clone(),
            namespace,
            tags: metric_tags(resource, exported),
        });

        for metric in &job.metrics {
            let dimensions = add_additional_dimensions(&base, &metric.additional_dimensions);
            tasks.spawn(scrape_resource_metric(
                ctx.clone(),
                job.clone(),
                target.clone(),
                Arc::new(metric.clone()),
                dimensions,
                monitoring.clone(),
            ));
        }
    }

    let mut metrics = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(results) => metrics.extend(results),
            Err(e) => tracing::error!(
                service = %job.service_type,
                error = %e,
                "Discovery metric task panicked"
            ),
        }
    }

    Ok(DiscoveryOutput { resources, metrics })
}

async fn discover(
    ctx: &ScrapeContext,
    job: &DiscoveryJob,
    tagging: &dyn TaggingApi,
) -> Result<Vec<DiscoveredResource>> {
    let _permit = ctx.gates.discovery_permit().await?;
    tagging.get_resources(job).await
}

/// What a metric task needs to know about its resource.
struct ResourceTarget {
    id: String,
    service: String,
    namespace: String,
    tags: Vec<Tag>,
}

/// List the concrete streams for one (resource, metric) pair, then fetch
/// each one. Failed calls produce no result.
async fn scrape_resource_metric(
    ctx: ScrapeContext,
    job: Arc<DiscoveryJob>,
    target: Arc<ResourceTarget>,
    metric: Arc<MetricSpec>,
    dimensions: Vec<Dimension>,
    monitoring: Arc<dyn MonitoringApi>,
) -> Vec<MetricResult> {
    let list_request = build_list_request(&dimensions, &target.namespace, &metric);
    let streams = match list_streams(&ctx, monitoring.as_ref(), &list_request).await {
        Ok(streams) => streams,
        Err(e) => {
            ctx.observer.fetch_failed(&target.id, &metric.name, &e);
            return Vec::new();
        }
    };

    let mut fetches = JoinSet::new();
    for stream in streams {
        let ctx = ctx.clone();
        let job = job.clone();
        let target = target.clone();
        let metric = metric.clone();
        let monitoring = monitoring.clone();

        fetches.spawn(async move {
            let request = build_statistics_request(
                &stream.dimensions,
                &target.namespace,
                &metric,
                Utc::now(),
            );
            match fetch_points(&ctx, monitoring.as_ref(), &request).await {
                Ok(points) => {
                    let result = MetricResult {
                        id: target.id.clone(),
                        metric: metric.name.clone(),
                        service: target.service.clone(),
                        statistics: metric.statistics.clone(),
                        nil_to_zero: metric.nil_to_zero,
                        add_cloudwatch_timestamp: metric.add_cloudwatch_timestamp,
                        custom_tags: job.custom_tags.clone(),
                        tags: target.tags.clone(),
                        dimensions: stream.dimensions,
                        region: job.region.clone(),
                        points,
                    };
                    ctx.observer.metric_fetched(&result);
                    Some(result)
                }
                Err(e) => {
                    ctx.observer.fetch_failed(&target.id, &metric.name, &e);
                    None
                }
            }
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = fetches.join_next().await {
        match joined {
            Ok(Some(result)) => results.push(result),
            Ok(None) => {}
            Err(e) => tracing::error!(
                resource = %target.id,
                metric = %metric.name,
                error = %e,
                "Metric fetch task panicked"
            ),
        }
    }
    results
}
