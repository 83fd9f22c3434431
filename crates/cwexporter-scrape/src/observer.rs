//! Lifecycle hooks for a scrape cycle.
//!
//! The scrapers never log on their own. They report to a [`ScrapeObserver`]
//! at job start, discovery, each fetch and job completion; the default
//! [`TracingObserver`] turns those reports into `tracing` events.

use crate::error::ScrapeError;
use cwexporter_common::jobs::{DiscoveryJob, StaticJob};
use cwexporter_common::types::{DiscoveredResource, MetricResult};

/// Borrowed view of either job kind, for reporting.
#[derive(Debug, Clone, Copy)]
pub enum JobRef<'a> {
    Discovery(&'a DiscoveryJob),
    Static(&'a StaticJob),
}

impl JobRef<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            JobRef::Discovery(_) => "discovery",
            JobRef::Static(_) => "static",
        }
    }

    /// Service type for discovery jobs, resource name for static jobs.
    pub fn name(&self) -> &str {
        match self {
            JobRef::Discovery(job) => &job.service_type,
            JobRef::Static(job) => &job.name,
        }
    }

    pub fn region(&self) -> &str {
        match self {
            JobRef::Discovery(job) => &job.region,
            JobRef::Static(job) => &job.region,
        }
    }
}

#[allow(unused_variables)]
pub trait ScrapeObserver: Send + Sync {
    fn job_started(&self, job: JobRef<'_>) {}

    /// The job could not run at all: client setup, invalid filter or failed
    /// discovery. Such a job never reports [`job_completed`](Self::job_completed).
    fn job_failed(&self, job: JobRef<'_>, error: &ScrapeError) {}

    /// `matched` of the `discovered` resources passed the job's tag filter.
    fn resources_discovered(&self, job: &DiscoveryJob, discovered: usize, matched: usize) {}

    fn resource_skipped(&self, resource: &DiscoveredResource, error: &ScrapeError) {}

    fn metric_fetched(&self, result: &MetricResult) {}

    fn fetch_failed(&self, id: &str, metric: &str, error: &ScrapeError) {}

    fn job_completed(&self, job: JobRef<'_>, resources: usize, metrics: usize) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ScrapeObserver for NoopObserver {}

/// Observer that emits structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ScrapeObserver for TracingObserver {
    fn job_started(&self, job: JobRef<'_>) {
        tracing::debug!(
            kind = job.kind(),
            job = job.name(),
            region = job.region(),
            "Scrape job started"
        );
    }

    fn job_failed(&self, job: JobRef<'_>, error: &ScrapeError) {
        tracing::error!(
            kind = job.kind(),
            job = job.name(),
            region = job.region(),
            error = %error,
            "Scrape job failed"
        );
    }

    fn resources_discovered(&self, job: &DiscoveryJob, discovered: usize, matched: usize) {
        tracing::info!(
            service = %job.service_type,
            region = %job.region,
            discovered,
            matched,
            "Discovered resources"
        );
    }

    fn resource_skipped(&self, resource: &DiscoveredResource, error: &ScrapeError) {
        tracing::warn!(
            resource = %resource.id,
            service = %resource.service,
            error = %error,
            "Skipping resource"
        );
    }

    fn metric_fetched(&self, result: &MetricResult) {
        tracing::trace!(
            resource = %result.id,
            metric = %result.metric,
            points = result.points.len(),
            "Fetched metric"
        );
    }

    fn fetch_failed(&self, id: &str, metric: &str, error: &ScrapeError) {
        tracing::warn!(
            resource = id,
            metric = metric,
            error = %error,
            "Failed to fetch metric"
        );
    }

    fn job_completed(&self, job: JobRef<'_>, resources: usize, metrics: usize) {
        tracing::debug!(
            kind = job.kind(),
            job = job.name(),
            region = job.region(),
            resources,
            metrics,
            "Scrape job completed"
        );
    }
}
