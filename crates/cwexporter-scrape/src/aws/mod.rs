//! AWS collaborators built on the AWS SDK.
//!
//! Credentials come from the default provider chain: environment, shared
//! profile, web identity, ECS task role or EC2 instance role. A job's
//! `role_arn` is assumed through STS on top of that chain. Throttling and
//! transient failures are retried by the SDK's standard retry policy.

mod autoscaling;
mod cloudwatch;
mod tagging;

pub use autoscaling::AutoScalingClient;
pub use cloudwatch::CloudWatchClient;
pub use tagging::TaggingClient;

use crate::error::{Result, ScrapeError};
use crate::services::{ResourceArn, ServiceRegistry};
use crate::{ClientFactory, MonitoringApi, TaggingApi};
use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_cloudwatch::error::{DisplayErrorContext, ProvideErrorMetadata};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const SESSION_NAME: &str = "cwexporter";

/// Error codes AWS services use for request throttling.
pub(crate) fn is_throttling(code: &str) -> bool {
    code.starts_with("Throttl")
        || code.starts_with("TooManyRequests")
        || code == "RequestLimitExceeded"
}

/// Maps an SDK error to a [`ScrapeError`], keeping the service error code.
pub(crate) fn api_error<E>(service: &'static str, err: E) -> ScrapeError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let message = match err.message() {
        Some(message) => message.to_string(),
        None => DisplayErrorContext(&err).to_string(),
    };
    match err.code() {
        Some(code) if is_throttling(code) => ScrapeError::RateLimited { service, message },
        code => ScrapeError::Api {
            service,
            code: code.unwrap_or("Unknown").to_string(),
            message,
        },
    }
}

type ConfigKey = (String, Option<String>);

/// Builds AWS clients per region, assuming the job's role when one is set.
///
/// One [`SdkConfig`] is loaded per (region, role) and reused across cycles,
/// so assumed-role credentials are cached and refreshed by the provider.
pub struct AwsClientFactory {
    registry: Arc<ServiceRegistry>,
    configs: Mutex<HashMap<ConfigKey, SdkConfig>>,
}

impl AwsClientFactory {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            configs: Mutex::new(HashMap::new()),
        }
    }

    async fn sdk_config(&self, region: &str, role_arn: Option<&str>) -> Result<SdkConfig> {
        let key = (region.to_string(), role_arn.map(str::to_string));
        let cached = {
            let configs = self
                .configs
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            configs.get(&key).cloned()
        };
        if let Some(config) = cached {
            return Ok(config);
        }

        let config = load_config(region, role_arn).await?;
        tracing::debug!(region, role = role_arn.unwrap_or("-"), "Loaded AWS config");

        self.configs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key, config.clone());
        Ok(config)
    }
}

async fn load_config(region: &str, role_arn: Option<&str>) -> Result<SdkConfig> {
    if let Some(role) = role_arn {
        ResourceArn::parse(role).map_err(|_| ScrapeError::ClientSetup {
            region: region.to_string(),
            message: format!("invalid role ARN {role:?}"),
        })?;
    }

    let shared = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await;
    let Some(role) = role_arn else {
        return Ok(shared);
    };

    let provider = AssumeRoleProvider::builder(role)
        .session_name(SESSION_NAME)
        .configure(&shared)
        .build()
        .await;

    Ok(aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .credentials_provider(provider)
        .load()
        .await)
}

#[async_trait::async_trait]
impl ClientFactory for AwsClientFactory {
    async fn monitoring(
        &self,
        region: &str,
        role_arn: Option<&str>,
    ) -> Result<Arc<dyn MonitoringApi>> {
        let config = self.sdk_config(region, role_arn).await?;
        Ok(Arc::new(CloudWatchClient::new(
            aws_sdk_cloudwatch::Client::new(&config),
            region,
        )))
    }

    async fn tagging(&self, region: &str, role_arn: Option<&str>) -> Result<Arc<dyn TaggingApi>> {
        let config = self.sdk_config(region, role_arn).await?;
        let autoscaling = Arc::new(AutoScalingClient::new(
            aws_sdk_autoscaling::Client::new(&config),
        ));
        Ok(Arc::new(TaggingClient::new(
            aws_sdk_resourcegroupstagging::Client::new(&config),
            self.registry.clone(),
            autoscaling,
        )))
    }
}
