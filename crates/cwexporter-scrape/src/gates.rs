use crate::error::Result;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Concurrency ceilings for one scrape cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeLimits {
    /// Max in-flight tagging API calls across all discovery jobs
    pub discovery: usize,
    /// Max in-flight monitoring API calls across all jobs
    pub metrics: usize,
}

impl Default for ScrapeLimits {
    fn default() -> Self {
        Self {
            discovery: 5,
            metrics: 5,
        }
    }
}

/// The two global gates. Cloning shares the underlying semaphores, so every
/// task of a cycle draws from the same pools.
#[derive(Debug, Clone)]
pub struct ScrapeGates {
    discovery: Arc<Semaphore>,
    metrics: Arc<Semaphore>,
}

impl ScrapeGates {
    /// Ceilings below one are raised to one.
    pub fn new(limits: ScrapeLimits) -> Self {
        Self {
            discovery: Arc::new(Semaphore::new(limits.discovery.max(1))),
            metrics: Arc::new(Semaphore::new(limits.metrics.max(1))),
        }
    }

    pub async fn discovery_permit(&self) -> Result<OwnedSemaphorePermit> {
        Ok(self.discovery.clone().acquire_owned().await?)
    }

    pub async fn metrics_permit(&self) -> Result<OwnedSemaphorePermit> {
        Ok(self.metrics.clone().acquire_owned().await?)
    }
}
