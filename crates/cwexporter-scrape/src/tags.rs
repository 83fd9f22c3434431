use crate::error::{Result, ScrapeError};
use cwexporter_common::jobs::ExportedTagsOnMetrics;
use cwexporter_common::types::{DiscoveredResource, Tag};
use regex::Regex;

/// Projects a resource's tags onto the exported schema for its service.
///
/// Every configured tag name is emitted in configured order, with an empty
/// value when the resource lacks it, so all metrics of one service carry
/// the same label set.
pub fn metric_tags(resource: &DiscoveredResource, exported: &ExportedTagsOnMetrics) -> Vec<Tag> {
    let Some(names) = exported.get(&resource.service) else {
        return Vec::new();
    };

    names
        .iter()
        .map(|name| {
            let value = resource
                .tags
                .iter()
                .find(|tag| &tag.key == name)
                .map(|tag| tag.value.clone())
                .unwrap_or_default();
            Tag::new(name.as_str(), value)
        })
        .collect()
}

/// Whether `resource` satisfies every filter tag. An invalid filter regex
/// never matches.
pub fn filter_through_tags(resource: &DiscoveredResource, filter_tags: &[Tag]) -> bool {
    TagFilter::new(filter_tags)
        .map(|filter| filter.matches(resource))
        .unwrap_or(false)
}

/// Search tags compiled once per job.
#[derive(Debug, Clone)]
pub struct TagFilter {
    rules: Vec<(String, Regex)>,
}

impl TagFilter {
    pub fn new(filter_tags: &[Tag]) -> Result<Self> {
        let rules = filter_tags
            .iter()
            .map(|tag| {
                Regex::new(&tag.value)
                    .map(|re| (tag.key.clone(), re))
                    .map_err(|source| ScrapeError::InvalidFilter {
                        key: tag.key.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// AND over all rules: each key must be present on the resource with a
    /// value the rule's regex matches. No rules matches everything.
    pub fn matches(&self, resource: &DiscoveredResource) -> bool {
        self.rules.iter().all(|(key, re)| {
            resource
                .tags
                .iter()
                .any(|tag| &tag.key == key && re.is_match(&tag.value))
        })
    }
}
