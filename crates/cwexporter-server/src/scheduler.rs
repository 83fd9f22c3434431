use crate::state::AppState;
use cwexporter_common::jobs::ScrapeConfig;
use cwexporter_scrape::orchestrator::Orchestrator;
use std::time::Instant;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Runs a scrape cycle right away and then every `interval_secs`,
/// publishing each snapshot to the shared state.
pub struct SnapshotScheduler {
    orchestrator: Orchestrator,
    config: ScrapeConfig,
    state: AppState,
    interval_secs: u64,
}

impl SnapshotScheduler {
    pub fn new(
        orchestrator: Orchestrator,
        config: ScrapeConfig,
        state: AppState,
        interval_secs: u64,
    ) -> Self {
        Self {
            orchestrator,
            config,
            state,
            interval_secs,
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.interval_secs,
            discovery_jobs = self.config.discovery.jobs.len(),
            static_jobs = self.config.static_jobs.len(),
            "Snapshot scheduler started"
        );

        let mut tick = interval(Duration::from_secs(self.interval_secs.max(1)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            self.run_once().await;
        }
    }

    /// One scrape cycle. The previous snapshot stays visible until this one
    /// is published.
    pub async fn run_once(&self) {
        let started = Instant::now();
        let snapshot = self.orchestrator.scrape(&self.config).await;
        tracing::info!(
            resources = snapshot.resources.len(),
            metrics = snapshot.metrics.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Published snapshot"
        );
        self.state.publish(snapshot);
    }
}
