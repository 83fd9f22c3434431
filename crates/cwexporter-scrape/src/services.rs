//! Per-service knowledge: monitoring namespace, tagging API resource-type
//! filters, and how a resource ARN becomes the dimensions the monitoring
//! API expects.
//!
//! Services are looked up by type name in a [`ServiceRegistry`]. Supporting
//! a new service means registering a [`ServiceDefinition`] for it.

use crate::error::{Result, ScrapeError};
use cwexporter_common::types::Dimension;
use std::collections::HashMap;
use std::sync::Arc;

/// `arn:partition:service:region:account-id:resource`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceArn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    /// Everything after the fifth colon, e.g. "instance/i-123" or "db:mydb"
    pub resource: String,
}

impl ResourceArn {
    pub fn parse(arn: &str) -> Result<Self> {
        let mut parts = arn.splitn(6, ':');
        let invalid = || ScrapeError::InvalidArn(arn.to_string());

        if parts.next() != Some("arn") {
            return Err(invalid());
        }
        let partition = parts.next().ok_or_else(invalid)?;
        let service = parts.next().ok_or_else(invalid)?;
        let region = parts.next().ok_or_else(invalid)?;
        let account_id = parts.next().ok_or_else(invalid)?;
        let resource = parts.next().ok_or_else(invalid)?;

        if partition.is_empty() || service.is_empty() || resource.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            partition: partition.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account_id: account_id.to_string(),
            resource: resource.to_string(),
        })
    }
}

/// Turns a parsed resource ARN into monitoring dimensions.
pub trait DimensionDetector: Send + Sync {
    fn detect(&self, arn: &ResourceArn) -> Result<Vec<Dimension>>;
}

impl<F> DimensionDetector for F
where
    F: Fn(&ResourceArn) -> Result<Vec<Dimension>> + Send + Sync,
{
    fn detect(&self, arn: &ResourceArn) -> Result<Vec<Dimension>> {
        self(arn)
    }
}

/// Single dimension whose value is the ARN resource with `prefix` trimmed.
/// A resource that does not start with the prefix is used whole.
#[derive(Debug, Clone)]
pub struct PrefixDimension {
    pub key: &'static str,
    pub prefix: &'static str,
}

impl DimensionDetector for PrefixDimension {
    fn detect(&self, arn: &ResourceArn) -> Result<Vec<Dimension>> {
        let value = arn
            .resource
            .strip_prefix(self.prefix)
            .unwrap_or(&arn.resource);
        Ok(vec![Dimension::new(self.key, value)])
    }
}

#[derive(Clone)]
pub struct ServiceDefinition {
    /// Service type as used in job configuration, e.g. "ec2"
    pub name: String,
    /// Monitoring namespace, e.g. "AWS/EC2"
    pub namespace: String,
    /// Tagging API resource-type filters
    pub resource_type_filters: Vec<String>,
    pub detector: Arc<dyn DimensionDetector>,
}

impl ServiceDefinition {
    pub fn new(
        name: &str,
        namespace: &str,
        resource_type_filters: &[&str],
        detector: impl DimensionDetector + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            resource_type_filters: resource_type_filters
                .iter()
                .map(|f| f.to_string())
                .collect(),
            detector: Arc::new(detector),
        }
    }
}

impl std::fmt::Debug for ServiceDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("resource_type_filters", &self.resource_type_filters)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceDefinition>,
}

impl ServiceRegistry {
    pub fn empty() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Adds or replaces the definition for `definition.name`.
    pub fn register(&mut self, definition: ServiceDefinition) {
        self.services.insert(definition.name.clone(), definition);
    }

    pub fn get(&self, service: &str) -> Option<&ServiceDefinition> {
        self.services.get(service)
    }

    pub fn contains(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    pub fn namespace(&self, service: &str) -> Result<&str> {
        self.get(service)
            .map(|def| def.namespace.as_str())
            .ok_or_else(|| ScrapeError::UnknownService(service.to_string()))
    }

    /// Registered service type names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for definition in builtin_services() {
            registry.register(definition);
        }
        registry
    }
}

fn prefix(key: &'static str, prefix: &'static str) -> PrefixDimension {
    PrefixDimension { key, prefix }
}

fn detect_alb(arn: &ResourceArn) -> Result<Vec<Dimension>> {
    if let Some(name) = arn.resource.strip_prefix("loadbalancer/") {
        Ok(vec![Dimension::new("LoadBalancer", name)])
    } else if arn.resource.starts_with("targetgroup/") {
        Ok(vec![Dimension::new("TargetGroup", arn.resource.as_str())])
    } else {
        Err(ScrapeError::InvalidArn(format!(
            "unexpected load balancer resource {}",
            arn.resource
        )))
    }
}

fn detect_asg(arn: &ResourceArn) -> Result<Vec<Dimension>> {
    // autoScalingGroup:<uuid>:autoScalingGroupName/<name>
    let (_, name) = arn
        .resource
        .split_once("autoScalingGroupName/")
        .ok_or_else(|| ScrapeError::InvalidArn(arn.resource.clone()))?;
    Ok(vec![Dimension::new("AutoScalingGroupName", name)])
}

fn detect_es(arn: &ResourceArn) -> Result<Vec<Dimension>> {
    let domain = arn.resource.strip_prefix("domain/").unwrap_or(&arn.resource);
    Ok(vec![
        Dimension::new("DomainName", domain),
        Dimension::new("ClientId", arn.account_id.as_str()),
    ])
}

fn builtin_services() -> Vec<ServiceDefinition> {
    vec![
        ServiceDefinition::new(
            "alb",
            "AWS/ApplicationELB",
            &[
                "elasticloadbalancing:loadbalancer/app",
                "elasticloadbalancing:targetgroup",
            ],
            detect_alb,
        ),
        ServiceDefinition::new("asg", "AWS/AutoScaling", &[], detect_asg),
        ServiceDefinition::new(
            "dynamodb",
            "AWS/DynamoDB",
            &["dynamodb:table"],
            prefix("TableName", "table/"),
        ),
        ServiceDefinition::new("ebs", "AWS/EBS", &["ec2:volume"], prefix("VolumeId", "volume/")),
        ServiceDefinition::new(
            "ec",
            "AWS/ElastiCache",
            &["elasticache:cluster"],
            prefix("CacheClusterId", "cluster:"),
        ),
        ServiceDefinition::new(
            "ec2",
            "AWS/EC2",
            &["ec2:instance"],
            prefix("InstanceId", "instance/"),
        ),
        ServiceDefinition::new(
            "efs",
            "AWS/EFS",
            &["elasticfilesystem:file-system"],
            prefix("FileSystemId", "file-system/"),
        ),
        ServiceDefinition::new(
            "elb",
            "AWS/ELB",
            &["elasticloadbalancing:loadbalancer"],
            prefix("LoadBalancerName", "loadbalancer/"),
        ),
        ServiceDefinition::new(
            "emr",
            "AWS/ElasticMapReduce",
            &["elasticmapreduce:cluster"],
            prefix("JobFlowId", "cluster/"),
        ),
        ServiceDefinition::new("es", "AWS/ES", &["es:domain"], detect_es),
        ServiceDefinition::new(
            "kinesis",
            "AWS/Kinesis",
            &["kinesis:stream"],
            prefix("StreamName", "stream/"),
        ),
        ServiceDefinition::new(
            "lambda",
            "AWS/Lambda",
            &["lambda:function"],
            prefix("FunctionName", "function:"),
        ),
        ServiceDefinition::new(
            "nlb",
            "AWS/NetworkELB",
            &["elasticloadbalancing:loadbalancer/net"],
            prefix("LoadBalancer", "loadbalancer/"),
        ),
        ServiceDefinition::new(
            "rds",
            "AWS/RDS",
            &["rds:db"],
            prefix("DBInstanceIdentifier", "db:"),
        ),
        ServiceDefinition::new("s3", "AWS/S3", &["s3"], prefix("BucketName", "")),
        ServiceDefinition::new("sqs", "AWS/SQS", &["sqs"], prefix("QueueName", "")),
        ServiceDefinition::new(
            "vpn",
            "AWS/VPN",
            &["ec2:vpn-connection"],
            prefix("VpnId", "vpn-connection/"),
        ),
    ]
}
