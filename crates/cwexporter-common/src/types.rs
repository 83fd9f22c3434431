use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key/value pair attached to a resource. `value` may be empty when a
/// resource lacks a tag that the exported schema requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Name/value pair selecting a metric stream.
///
/// A dimension without a value is a name-only filter: list requests match
/// any stream carrying that dimension name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn name_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

/// A resource returned by the tagging collaborator for a discovery job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredResource {
    /// Resource ARN
    pub id: String,
    /// Service type, e.g. "ec2", "sqs"
    pub service: String,
    pub region: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// One datapoint as reported by the monitoring API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub timestamp: DateTime<Utc>,
    pub average: Option<f64>,
    pub sum: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub sample_count: Option<f64>,
    /// Percentile statistics keyed by name, e.g. "p99"
    #[serde(default)]
    pub extended: BTreeMap<String, f64>,
}

impl Datapoint {
    pub fn empty_at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            average: None,
            sum: None,
            minimum: None,
            maximum: None,
            sample_count: None,
            extended: BTreeMap::new(),
        }
    }

    /// Value of a statistic by its monitoring API name.
    ///
    /// ```
    /// use chrono::Utc;
    /// use cwexporter_common::types::Datapoint;
    ///
    /// let mut dp = Datapoint::empty_at(Utc::now());
    /// dp.sum = Some(4.0);
    /// dp.extended.insert("p99".to_string(), 12.5);
    /// assert_eq!(dp.value("Sum"), Some(4.0));
    /// assert_eq!(dp.value("p99"), Some(12.5));
    /// assert_eq!(dp.value("Average"), None);
    /// ```
    pub fn value(&self, statistic: &str) -> Option<f64> {
        match statistic {
            "Average" => self.average,
            "Sum" => self.sum,
            "Minimum" => self.minimum,
            "Maximum" => self.maximum,
            "SampleCount" => self.sample_count,
            other => self.extended.get(other).copied(),
        }
    }
}

/// The unit of scrape output: datapoints for one metric of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Resource ARN for discovery jobs, configured name for static jobs
    pub id: String,
    pub metric: String,
    pub service: String,
    pub statistics: Vec<String>,
    pub nil_to_zero: bool,
    pub add_cloudwatch_timestamp: bool,
    #[serde(default)]
    pub custom_tags: Vec<Tag>,
    /// Enrichment tags, identical key order for every resource of a service
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub dimensions: Vec<Dimension>,
    pub region: String,
    #[serde(default)]
    pub points: Vec<Datapoint>,
}

impl MetricResult {
    /// Most recent datapoint, if any were returned.
    pub fn latest_point(&self) -> Option<&Datapoint> {
        self.points.iter().max_by_key(|p| p.timestamp)
    }
}

/// Everything one scrape cycle collected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeSnapshot {
    pub resources: Vec<DiscoveredResource>,
    pub metrics: Vec<MetricResult>,
    pub collected_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn result_with_points(points: Vec<Datapoint>) -> MetricResult {
        MetricResult {
            id: "arn:aws:ec2:eu-west-1:123456789012:instance/i-1".to_string(),
            metric: "CPUUtilization".to_string(),
            service: "ec2".to_string(),
            statistics: vec!["Average".to_string()],
            nil_to_zero: false,
            add_cloudwatch_timestamp: false,
            custom_tags: vec![],
            tags: vec![],
            dimensions: vec![Dimension::new("InstanceId", "i-1")],
            region: "eu-west-1".to_string(),
            points,
        }
    }

    #[test]
    fn latest_point_picks_newest_timestamp() {
        let older = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();
        let mut a = Datapoint::empty_at(newer);
        a.average = Some(2.0);
        let mut b = Datapoint::empty_at(older);
        b.average = Some(1.0);

        let result = result_with_points(vec![a, b]);
        assert_eq!(result.latest_point().and_then(|p| p.average), Some(2.0));
    }

    #[test]
    fn latest_point_is_none_without_datapoints() {
        assert!(result_with_points(vec![]).latest_point().is_none());
    }

    #[test]
    fn dimension_without_value_deserializes_as_name_only() {
        let dim: Dimension = serde_json::from_str(r#"{"name":"AutoScalingGroupName"}"#)
            .expect("dimension should parse");
        assert_eq!(dim, Dimension::name_only("AutoScalingGroupName"));
    }
}
