use super::api_error;
use crate::error::Result;
use crate::AutoScalingApi;
use aws_sdk_autoscaling::types::TagDescription;
use aws_sdk_autoscaling::Client;
use cwexporter_common::types::{DiscoveredResource, Tag};

pub struct AutoScalingClient {
    client: Client,
}

fn group_tags(tags: &[TagDescription]) -> Vec<Tag> {
    tags.iter()
        .filter_map(|t| Some(Tag::new(t.key()?, t.value().unwrap_or_default())))
        .collect()
}

fn group_resource(arn: &str, tags: &[TagDescription], region: &str) -> DiscoveredResource {
    DiscoveredResource {
        id: arn.to_string(),
        service: "asg".to_string(),
        region: region.to_string(),
        tags: group_tags(tags),
    }
}

impl AutoScalingClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl AutoScalingApi for AutoScalingClient {
    async fn describe_groups(&self, region: &str) -> Result<Vec<DiscoveredResource>> {
        let mut groups = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let output = self
                .client
                .describe_auto_scaling_groups()
                .set_next_token(token.take())
                .send()
                .await
                .map_err(|e| api_error("AutoScaling", e))?;

            groups.extend(output.auto_scaling_groups().iter().filter_map(|group| {
                let arn = group.auto_scaling_group_arn()?;
                Some(group_resource(arn, group.tags(), region))
            }));
            match output.next_token() {
                Some(next) if !next.is_empty() => token = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(groups)
    }
}
