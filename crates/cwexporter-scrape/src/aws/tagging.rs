use super::api_error;
use crate::error::{Result, ScrapeError};
use crate::services::ServiceRegistry;
use crate::{AutoScalingApi, TaggingApi};
use aws_sdk_resourcegroupstagging::types::ResourceTagMapping;
use aws_sdk_resourcegroupstagging::Client;
use cwexporter_common::jobs::DiscoveryJob;
use cwexporter_common::types::{DiscoveredResource, Tag};
use std::sync::Arc;

const RESOURCES_PER_PAGE: i32 = 100;

/// Resource Groups Tagging API client. Auto scaling groups are not indexed
/// there, so `asg` jobs are delegated to an [`AutoScalingApi`].
pub struct TaggingClient {
    client: Client,
    registry: Arc<ServiceRegistry>,
    autoscaling: Arc<dyn AutoScalingApi>,
}

fn discovered(mapping: &ResourceTagMapping, job: &DiscoveryJob) -> Option<DiscoveredResource> {
    Some(DiscoveredResource {
        id: mapping.resource_arn()?.to_string(),
        service: job.service_type.clone(),
        region: job.region.clone(),
        tags: mapping
            .tags()
            .iter()
            .map(|t| Tag::new(t.key(), t.value()))
            .collect(),
    })
}

fn discovery_error(job: &DiscoveryJob, err: ScrapeError) -> ScrapeError {
    ScrapeError::Discovery {
        service: job.service_type.clone(),
        region: job.region.clone(),
        message: err.to_string(),
    }
}

impl TaggingClient {
    pub fn new(
        client: Client,
        registry: Arc<ServiceRegistry>,
        autoscaling: Arc<dyn AutoScalingApi>,
    ) -> Self {
        Self {
            client,
            registry,
            autoscaling,
        }
    }
}

#[async_trait::async_trait]
impl TaggingApi for TaggingClient {
    async fn get_resources(&self, job: &DiscoveryJob) -> Result<Vec<DiscoveredResource>> {
        if job.service_type == "asg" {
            return self
                .autoscaling
                .describe_groups(&job.region)
                .await
                .map_err(|e| discovery_error(job, e));
        }

        let filters = self
            .registry
            .get(&job.service_type)
            .ok_or_else(|| ScrapeError::UnknownService(job.service_type.clone()))?
            .resource_type_filters
            .clone();

        let mut resources = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let output = self
                .client
                .get_resources()
                .set_resource_type_filters(Some(filters.clone()))
                .resources_per_page(RESOURCES_PER_PAGE)
                .set_pagination_token(token.take())
                .send()
                .await
                .map_err(|e| discovery_error(job, api_error("Tagging", e)))?;

            resources.extend(
                output
                    .resource_tag_mapping_list()
                    .iter()
                    .filter_map(|mapping| discovered(mapping, job)),
            );
            match output.pagination_token() {
                Some(next) if !next.is_empty() => token = Some(next.to_string()),
                _ => break,
            }
        }

        tracing::debug!(
            service = %job.service_type,
            region = %job.region,
            resources = resources.len(),
            "Discovered resources"
        );
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::discovery_job;
    use aws_sdk_resourcegroupstagging::types::Tag as AwsTag;

    #[test]
    fn test_mapping_takes_job_service_and_region() {
        let mapping = ResourceTagMapping::builder()
            .resource_arn("arn:aws:sqs:eu-west-1:123456789012:orders")
            .tags(AwsTag::builder().key("env").value("prod").build().unwrap())
            .build();
        let job = discovery_job("sqs", "eu-west-1", &[]);

        let resource = discovered(&mapping, &job).unwrap();

        assert_eq!(resource.id, "arn:aws:sqs:eu-west-1:123456789012:orders");
        assert_eq!(resource.service, "sqs");
        assert_eq!(resource.region, "eu-west-1");
        assert_eq!(resource.tags, vec![Tag::new("env", "prod")]);
    }

    #[test]
    fn test_mapping_without_arn_is_skipped() {
        let job = discovery_job("sqs", "eu-west-1", &[]);
        assert!(discovered(&ResourceTagMapping::builder().build(), &job).is_none());
    }

    #[test]
    fn test_errors_are_wrapped_as_discovery_failures() {
        let job = discovery_job("ec2", "eu-west-1", &[]);
        let err = discovery_error(
            &job,
            ScrapeError::Api {
                service: "Tagging",
                code: "AccessDenied".to_string(),
                message: "not authorized".to_string(),
            },
        );

        match err {
            ScrapeError::Discovery {
                service,
                region,
                message,
            } => {
                assert_eq!(service, "ec2");
                assert_eq!(region, "eu-west-1");
                assert!(message.contains("AccessDenied"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
