use crate::types::{Dimension, Tag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Service type → tag names exported as labels on every metric of that service.
pub type ExportedTagsOnMetrics = BTreeMap<String, Vec<String>>;

/// One metric to collect, shared by discovery and static jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    pub statistics: Vec<String>,
    /// Emit 0 instead of nothing when the API returns no datapoint
    #[serde(default)]
    pub nil_to_zero: bool,
    /// Use the API-reported timestamp instead of scrape time
    #[serde(default)]
    pub add_cloudwatch_timestamp: bool,
    #[serde(default)]
    pub additional_dimensions: Vec<Dimension>,
    #[serde(default = "default_period_secs")]
    pub period_secs: u32,
    #[serde(default = "default_length_secs")]
    pub length_secs: u32,
    #[serde(default)]
    pub delay_secs: u32,
}

fn default_period_secs() -> u32 {
    300
}

fn default_length_secs() -> u32 {
    300
}

/// Tag-based discovery target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryJob {
    pub region: String,
    #[serde(default)]
    pub role_arn: Option<String>,
    /// Service type, e.g. "ec2"
    #[serde(rename = "type")]
    pub service_type: String,
    /// Inclusion filters; values are regular expressions, all must match
    #[serde(default)]
    pub search_tags: Vec<Tag>,
    /// Dimension names added as name-only filters to every list request
    #[serde(default)]
    pub aws_dimensions: Vec<String>,
    #[serde(default)]
    pub custom_tags: Vec<Tag>,
    pub metrics: Vec<MetricSpec>,
}

/// Explicitly named resource with a fixed dimension set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticJob {
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub role_arn: Option<String>,
    /// Monitoring namespace, e.g. "AWS/EC2"
    pub namespace: String,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub custom_tags: Vec<Tag>,
    pub metrics: Vec<MetricSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub exported_tags_on_metrics: ExportedTagsOnMetrics,
    #[serde(default)]
    pub jobs: Vec<DiscoveryJob>,
}

/// Everything a scrape cycle needs to know about what to collect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default, rename = "static")]
    pub static_jobs: Vec<StaticJob>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_discovery_and_static_jobs_from_toml() {
        let cfg: ScrapeConfig = toml::from_str(
            r#"
            [discovery.exported_tags_on_metrics]
            ec2 = ["Name", "env"]

            [[discovery.jobs]]
            region = "eu-west-1"
            type = "ec2"
            search_tags = [{ key = "env", value = "prod" }]

            [[discovery.jobs.metrics]]
            name = "CPUUtilization"
            statistics = ["Average"]

            [[static]]
            name = "web-1"
            region = "eu-west-1"
            namespace = "AWS/EC2"
            dimensions = [{ name = "InstanceId", value = "i-123" }]

            [[static.metrics]]
            name = "NetworkIn"
            statistics = ["Sum"]
            nil_to_zero = true
            "#,
        )
        .expect("config should parse");

        assert_eq!(
            cfg.discovery.exported_tags_on_metrics["ec2"],
            vec!["Name".to_string(), "env".to_string()]
        );
        let job = &cfg.discovery.jobs[0];
        assert_eq!(job.service_type, "ec2");
        assert_eq!(job.search_tags, vec![Tag::new("env", "prod")]);
        assert_eq!(job.metrics[0].period_secs, 300);
        assert_eq!(job.metrics[0].length_secs, 300);
        assert!(job.role_arn.is_none());

        let static_job = &cfg.static_jobs[0];
        assert_eq!(static_job.namespace, "AWS/EC2");
        assert_eq!(static_job.dimensions, vec![Dimension::new("InstanceId", "i-123")]);
        assert!(static_job.metrics[0].nil_to_zero);
    }

    #[test]
    fn empty_document_yields_empty_config() {
        let cfg: ScrapeConfig = toml::from_str("").expect("empty config should parse");
        assert!(cfg.discovery.jobs.is_empty());
        assert!(cfg.static_jobs.is_empty());
    }
}
