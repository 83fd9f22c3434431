//! Prometheus text exposition of a scrape snapshot.
//!
//! Each render builds a throwaway [`Registry`] with one [`GaugeVec`] per
//! metric family. A family's label names are the union over its series,
//! sorted; a series without one of them exports it as `""`.

use cwexporter_common::types::{DiscoveredResource, MetricResult, ScrapeSnapshot};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

const HELP: &str = "Help is not implemented yet.";

struct Sample {
    labels: Labels,
    value: f64,
    timestamp_ms: Option<i64>,
}

/// Samples grouped by metric family name.
#[derive(Default)]
struct Families(BTreeMap<String, Vec<Sample>>);

impl Families {
    fn push(&mut self, family: String, sample: Sample) {
        self.0.entry(family).or_default().push(sample);
    }
}

/// Label values in sorted label-name order, keyed by family.
type Timestamps = HashMap<String, HashMap<Vec<String>, i64>>;

/// Renders every metric result and one `_info` series per discovered
/// resource. A repeated series keeps its first value.
pub fn render(snapshot: &ScrapeSnapshot) -> prometheus::Result<String> {
    let mut families = Families::default();
    for result in &snapshot.metrics {
        collect_metric(&mut families, result);
    }
    for resource in &snapshot.resources {
        collect_info(&mut families, resource);
    }

    let registry = Registry::new();
    let mut timestamps = Timestamps::new();
    for (family, samples) in families.0 {
        let names: Vec<&str> = samples
            .iter()
            .flat_map(|s| s.labels.0.iter().map(|(name, _)| name.as_str()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let gauge = GaugeVec::new(Opts::new(family.as_str(), HELP), &names)?;

        let mut seen = HashSet::new();
        for sample in &samples {
            let values: Vec<&str> = names
                .iter()
                .map(|name| sample.labels.get(name).unwrap_or_default())
                .collect();
            if !seen.insert(values.clone()) {
                continue;
            }
            gauge.get_metric_with_label_values(&values)?.set(sample.value);
            if let Some(ts) = sample.timestamp_ms {
                timestamps
                    .entry(family.clone())
                    .or_default()
                    .insert(values.iter().map(|v| v.to_string()).collect(), ts);
            }
        }
        registry.register(Box::new(gauge))?;
    }

    let mut gathered = registry.gather();
    apply_timestamps(&mut gathered, &timestamps);

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&gathered, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Gathered label pairs are sorted by name, matching the key order.
fn apply_timestamps(gathered: &mut [prometheus::proto::MetricFamily], timestamps: &Timestamps) {
    for family in gathered {
        let Some(by_labels) = timestamps.get(family.get_name()) else {
            continue;
        };
        for metric in family.mut_metric().iter_mut() {
            let key: Vec<String> = metric
                .get_label()
                .iter()
                .map(|pair| pair.get_value().to_string())
                .collect();
            if let Some(ts) = by_labels.get(&key) {
                metric.set_timestamp_ms(*ts);
            }
        }
    }
}

fn collect_metric(families: &mut Families, result: &MetricResult) {
    let point = result.latest_point();
    let labels = metric_labels(result);
    let service = sanitize(&result.service.to_lowercase());
    let metric = snake_case(&result.metric);

    for statistic in &result.statistics {
        let family = format!(
            "aws_{service}_{metric}_{}",
            sanitize(&statistic.to_lowercase())
        );

        let (value, timestamp_ms) = match point.and_then(|p| p.value(statistic)) {
            Some(v) => (
                v,
                point
                    .filter(|_| result.add_cloudwatch_timestamp)
                    .map(|p| p.timestamp.timestamp_millis()),
            ),
            None if result.nil_to_zero => (0.0, None),
            None => continue,
        };

        families.push(
            family,
            Sample {
                labels: labels.clone(),
                value,
                timestamp_ms,
            },
        );
    }
}

fn collect_info(families: &mut Families, resource: &DiscoveredResource) {
    let family = format!("aws_{}_info", sanitize(&resource.service.to_lowercase()));
    let mut labels = Labels::default();
    labels.add("name", &resource.id);
    for tag in &resource.tags {
        labels.add(&format!("tag_{}", sanitize(&tag.key)), &tag.value);
    }
    families.push(
        family,
        Sample {
            labels,
            value: 0.0,
            timestamp_ms: None,
        },
    );
}

/// Ordered label set; a repeated name keeps its first value.
#[derive(Debug, Clone, Default)]
struct Labels(Vec<(String, String)>);

impl Labels {
    fn add(&mut self, name: &str, value: &str) {
        if !self.0.iter().any(|(n, _)| n == name) {
            self.0.push((name.to_string(), value.to_string()));
        }
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

fn metric_labels(result: &MetricResult) -> Labels {
    let mut labels = Labels::default();
    labels.add("name", &result.id);
    labels.add("region", &result.region);
    for dimension in &result.dimensions {
        labels.add(
            &format!("dimension_{}", snake_case(&dimension.name)),
            dimension.value.as_deref().unwrap_or_default(),
        );
    }
    for tag in &result.tags {
        labels.add(&format!("tag_{}", sanitize(&tag.key)), &tag.value);
    }
    for tag in &result.custom_tags {
        labels.add(&format!("custom_tag_{}", sanitize(&tag.key)), &tag.value);
    }
    labels
}

/// Replaces anything outside `[a-zA-Z0-9_]` with `_`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// `CPUUtilization` → `cpu_utilization`, `NetworkIn` → `network_in`.
fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }

    sanitize(&out)
}
