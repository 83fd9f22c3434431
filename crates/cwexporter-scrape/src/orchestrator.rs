use crate::gates::{ScrapeGates, ScrapeLimits};
use crate::observer::{JobRef, ScrapeObserver, TracingObserver};
use crate::scraper::{scrape_discovery_job, scrape_static_job, ScrapeContext};
use crate::services::ServiceRegistry;
use crate::ClientFactory;
use chrono::Utc;
use cwexporter_common::jobs::{DiscoveryJob, ExportedTagsOnMetrics, ScrapeConfig, StaticJob};
use cwexporter_common::types::{DiscoveredResource, MetricResult, ScrapeSnapshot};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;

/// Runs every job of a [`ScrapeConfig`] concurrently and merges their output
/// into one [`ScrapeSnapshot`].
///
/// A failing job never affects the others: client setup errors, discovery
/// errors and panics are reported to the observer and the job contributes
/// nothing. A resource reported by several jobs appears once in the
/// snapshot.
pub struct Orchestrator {
    factory: Arc<dyn ClientFactory>,
    limits: ScrapeLimits,
    registry: Arc<ServiceRegistry>,
    observer: Arc<dyn ScrapeObserver>,
}

/// Results appended by job tasks. Order across jobs is unspecified.
#[derive(Default)]
struct Arena {
    resources: Vec<DiscoveredResource>,
    metrics: Vec<MetricResult>,
}

impl Arena {
    /// Keeps the first report of each (service, id).
    fn dedup_resources(&mut self) {
        let mut seen = HashSet::new();
        self.resources
            .retain(|r| seen.insert((r.service.clone(), r.id.clone())));
    }
}

type SharedArena = Arc<Mutex<Arena>>;

fn append(arena: &SharedArena, resources: Vec<DiscoveredResource>, metrics: Vec<MetricResult>) {
    let mut guard = arena.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.resources.extend(resources);
    guard.metrics.extend(metrics);
}

impl Orchestrator {
    pub fn new(factory: Arc<dyn ClientFactory>, limits: ScrapeLimits) -> Self {
        Self {
            factory,
            limits,
            registry: Arc::new(ServiceRegistry::default()),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Shares `registry` with other users, e.g. the tagging client.
    pub fn with_registry(mut self, registry: Arc<ServiceRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ScrapeObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// One full scrape cycle. Fresh gates are created per cycle, so the
    /// ceilings hold across all jobs of this call.
    pub async fn scrape(&self, config: &ScrapeConfig) -> ScrapeSnapshot {
        let ctx = ScrapeContext {
            gates: ScrapeGates::new(self.limits),
            registry: self.registry.clone(),
            observer: self.observer.clone(),
        };
        let exported = Arc::new(config.discovery.exported_tags_on_metrics.clone());
        let arena: SharedArena = Arc::default();
        let mut jobs = JoinSet::new();

        for job in &config.discovery.jobs {
            jobs.spawn(run_discovery_job(
                ctx.clone(),
                self.factory.clone(),
                Arc::new(job.clone()),
                exported.clone(),
                arena.clone(),
            ));
        }

        for job in &config.static_jobs {
            jobs.spawn(run_static_job(
                ctx.clone(),
                self.factory.clone(),
                Arc::new(job.clone()),
                arena.clone(),
            ));
        }

        while let Some(joined) = jobs.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Scrape job task panicked");
            }
        }

        let mut arena = std::mem::take(
            &mut *arena
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        arena.dedup_resources();
        tracing::info!(
            resources = arena.resources.len(),
            metrics = arena.metrics.len(),
            "Scrape cycle finished"
        );

        ScrapeSnapshot {
            resources: arena.resources,
            metrics: arena.metrics,
            collected_at: Some(Utc::now()),
        }
    }
}

async fn run_discovery_job(
    ctx: ScrapeContext,
    factory: Arc<dyn ClientFactory>,
    job: Arc<DiscoveryJob>,
    exported: Arc<ExportedTagsOnMetrics>,
    arena: SharedArena,
) {
    ctx.observer.job_started(JobRef::Discovery(&job));

    let role_arn = job.role_arn.as_deref();
    let clients = async {
        let tagging = factory.tagging(&job.region, role_arn).await?;
        let monitoring = factory.monitoring(&job.region, role_arn).await?;
        Ok::<_, crate::error::ScrapeError>((tagging, monitoring))
    };
    let (tagging, monitoring) = match clients.await {
        Ok(clients) => clients,
        Err(e) => {
            ctx.observer.job_failed(JobRef::Discovery(&job), &e);
            return;
        }
    };

    let output =
        match scrape_discovery_job(&ctx, job.clone(), &exported, tagging, monitoring).await {
            Ok(output) => output,
            Err(e) => {
                ctx.observer.job_failed(JobRef::Discovery(&job), &e);
                return;
            }
        };
    ctx.observer.job_completed(
        JobRef::Discovery(&job),
        output.resources.len(),
        output.metrics.len(),
    );
    append(&arena, output.resources, output.metrics);
}

async fn run_static_job(
    ctx: ScrapeContext,
    factory: Arc<dyn ClientFactory>,
    job: Arc<StaticJob>,
    arena: SharedArena,
) {
    ctx.observer.job_started(JobRef::Static(&job));

    let monitoring = match factory.monitoring(&job.region, job.role_arn.as_deref()).await {
        Ok(monitoring) => monitoring,
        Err(e) => {
            ctx.observer.job_failed(JobRef::Static(&job), &e);
            return;
        }
    };

    let metrics = scrape_static_job(&ctx, job.clone(), monitoring).await;
    ctx.observer.job_completed(JobRef::Static(&job), 0, metrics.len());
    append(&arena, Vec::new(), metrics);
}
