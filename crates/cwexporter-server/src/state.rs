use chrono::{DateTime, Utc};
use cwexporter_common::types::ScrapeSnapshot;
use std::sync::{Arc, RwLock};

/// Shared between the scrape scheduler (writer) and the HTTP handlers
/// (readers).
#[derive(Clone)]
pub struct AppState {
    snapshot: Arc<RwLock<Option<Arc<ScrapeSnapshot>>>>,
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(None)),
            start_time: Utc::now(),
        }
    }

    /// `None` until the first scrape cycle has completed.
    pub fn latest(&self) -> Option<Arc<ScrapeSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn publish(&self, snapshot: ScrapeSnapshot) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(snapshot));
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
