use anyhow::{bail, Context};
use cwexporter_common::jobs::{DiscoveryConfig, ScrapeConfig, StaticJob};
use cwexporter_scrape::gates::ScrapeLimits;
use cwexporter_scrape::services::ServiceRegistry;
use cwexporter_scrape::tags::TagFilter;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Seconds between the start of two scrape cycles
    #[serde(default = "default_scrape_interval_secs")]
    pub scrape_interval_secs: u64,
    /// Max in-flight tagging API calls
    #[serde(default = "default_concurrency")]
    pub discovery_concurrency: usize,
    /// Max in-flight monitoring API calls
    #[serde(default = "default_concurrency")]
    pub metrics_concurrency: usize,

    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default, rename = "static")]
    pub static_jobs: Vec<StaticJob>,
}

fn default_http_port() -> u16 {
    5000
}

fn default_scrape_interval_secs() -> u64 {
    300
}

fn default_concurrency() -> usize {
    5
}

impl ExporterConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {path}"))?;
        Ok(config)
    }

    /// Rejects configurations that would make every cycle fail the same way.
    pub fn validate(&self, registry: &ServiceRegistry) -> anyhow::Result<()> {
        if self.scrape_interval_secs == 0 {
            bail!("scrape_interval_secs must be at least 1");
        }
        if self.discovery_concurrency == 0 || self.metrics_concurrency == 0 {
            bail!("discovery_concurrency and metrics_concurrency must be at least 1");
        }

        for (i, job) in self.discovery.jobs.iter().enumerate() {
            if job.region.is_empty() {
                bail!("discovery job #{i} ({}) has no region", job.service_type);
            }
            if !registry.contains(&job.service_type) {
                bail!(
                    "discovery job #{i} has unsupported type {:?}, expected one of {}",
                    job.service_type,
                    registry.names().join(", ")
                );
            }
            TagFilter::new(&job.search_tags)
                .with_context(|| format!("discovery job #{i} ({})", job.service_type))?;
            for metric in &job.metrics {
                if metric.statistics.is_empty() {
                    bail!(
                        "discovery job #{i} ({}) metric {} has no statistics",
                        job.service_type,
                        metric.name
                    );
                }
            }
        }

        for job in &self.static_jobs {
            if job.name.is_empty() || job.region.is_empty() || job.namespace.is_empty() {
                bail!("static job {:?} needs a name, region and namespace", job.name);
            }
            if let Some(metric) = job.metrics.iter().find(|m| m.statistics.is_empty()) {
                bail!("static job {} metric {} has no statistics", job.name, metric.name);
            }
        }

        Ok(())
    }

    pub fn limits(&self) -> ScrapeLimits {
        ScrapeLimits {
            discovery: self.discovery_concurrency,
            metrics: self.metrics_concurrency,
        }
    }

    pub fn scrape_config(&self) -> ScrapeConfig {
        ScrapeConfig {
            discovery: self.discovery.clone(),
            static_jobs: self.static_jobs.clone(),
        }
    }
}
