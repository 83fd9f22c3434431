use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use cwexporter_common::jobs::{DiscoveryJob, MetricSpec, ScrapeConfig, StaticJob};
use cwexporter_common::types::{Datapoint, Dimension, DiscoveredResource, Tag};
use cwexporter_scrape::error::Result;
use cwexporter_scrape::gates::ScrapeLimits;
use cwexporter_scrape::observer::NoopObserver;
use cwexporter_scrape::orchestrator::Orchestrator;
use cwexporter_scrape::{
    ClientFactory, GetMetricStatisticsRequest, ListMetricsRequest, MetricDescriptor,
    MonitoringApi, TaggingApi,
};
use cwexporter_server::app::build_http_app;
use cwexporter_server::scheduler::SnapshotScheduler;
use cwexporter_server::state::AppState;
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

struct FixedMonitoring;

#[async_trait::async_trait]
impl MonitoringApi for FixedMonitoring {
    async fn list_metrics(&self, request: &ListMetricsRequest) -> Result<Vec<MetricDescriptor>> {
        Ok(vec![MetricDescriptor {
            namespace: request.namespace.clone(),
            metric_name: request.metric_name.clone(),
            dimensions: request.dimensions.clone(),
        }])
    }

    async fn get_metric_statistics(
        &self,
        request: &GetMetricStatisticsRequest,
    ) -> Result<Vec<Datapoint>> {
        let mut point = Datapoint::empty_at(request.end_time);
        point.average = Some(42.0);
        point.sum = Some(7.0);
        Ok(vec![point])
    }
}

struct FixedTagging;

#[async_trait::async_trait]
impl TaggingApi for FixedTagging {
    async fn get_resources(&self, job: &DiscoveryJob) -> Result<Vec<DiscoveredResource>> {
        Ok(vec![
            DiscoveredResource {
                id: format!("arn:aws:ec2:{}:123456789012:instance/i-prod", job.region),
                service: job.service_type.clone(),
                region: job.region.clone(),
                tags: vec![Tag::new("env", "prod")],
            },
            DiscoveredResource {
                id: format!("arn:aws:ec2:{}:123456789012:instance/i-dev", job.region),
                service: job.service_type.clone(),
                region: job.region.clone(),
                tags: vec![Tag::new("env", "dev")],
            },
        ])
    }
}

struct FixedFactory;

#[async_trait::async_trait]
impl ClientFactory for FixedFactory {
    async fn monitoring(
        &self,
        _region: &str,
        _role_arn: Option<&str>,
    ) -> Result<Arc<dyn MonitoringApi>> {
        Ok(Arc::new(FixedMonitoring))
    }

    async fn tagging(&self, _region: &str, _role_arn: Option<&str>) -> Result<Arc<dyn TaggingApi>> {
        Ok(Arc::new(FixedTagging))
    }
}

fn metric(name: &str, statistic: &str) -> MetricSpec {
    MetricSpec {
        name: name.to_string(),
        statistics: vec![statistic.to_string()],
        nil_to_zero: false,
        add_cloudwatch_timestamp: false,
        additional_dimensions: vec![],
        period_secs: 300,
        length_secs: 300,
        delay_secs: 0,
    }
}

fn scrape_config() -> ScrapeConfig {
    let mut config = ScrapeConfig::default();
    config.discovery.jobs.push(DiscoveryJob {
        region: "eu-west-1".to_string(),
        role_arn: None,
        service_type: "ec2".to_string(),
        search_tags: vec![Tag::new("env", "prod")],
        aws_dimensions: vec![],
        custom_tags: vec![],
        metrics: vec![metric("CPUUtilization", "Average")],
    });
    config.static_jobs.push(StaticJob {
        name: "orders".to_string(),
        region: "us-east-1".to_string(),
        role_arn: None,
        namespace: "AWS/SQS".to_string(),
        dimensions: vec![Dimension::new("QueueName", "orders")],
        custom_tags: vec![Tag::new("team", "payments")],
        metrics: vec![metric("NumberOfMessagesSent", "Sum")],
    });
    config
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, String) {
    let req = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    (status, String::from_utf8_lossy(&bytes).to_string())
}

async fn scraped_state() -> AppState {
    let state = AppState::new();
    let orchestrator = Orchestrator::new(Arc::new(FixedFactory), ScrapeLimits::default())
        .with_observer(Arc::new(NoopObserver));
    SnapshotScheduler::new(orchestrator, scrape_config(), state.clone(), 300)
        .run_once()
        .await;
    state
}

#[tokio::test]
async fn metrics_unavailable_before_first_scrape() {
    let app = build_http_app(AppState::new());

    let (status, _) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_str(&body).expect("health should be json");
    assert_eq!(health["status"], "starting");
    assert!(health["last_scrape"].is_null());
}

#[tokio::test]
async fn metrics_expose_latest_snapshot() {
    let app = build_http_app(scraped_state().await);

    let (status, body) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);

    assert!(body.contains("# TYPE aws_ec2_cpu_utilization_average gauge"));
    assert!(body.contains(
        "aws_ec2_cpu_utilization_average{dimension_instance_id=\"i-prod\",\
         name=\"arn:aws:ec2:eu-west-1:123456789012:instance/i-prod\",region=\"eu-west-1\"} 42\n"
    ));
    assert!(!body.contains("dimension_instance_id=\"i-dev\""));

    assert!(body.contains(
        "aws_sqs_number_of_messages_sent_sum{custom_tag_team=\"payments\",\
         dimension_queue_name=\"orders\",name=\"orders\",region=\"us-east-1\"} 7"
    ));

    assert_eq!(body.matches("aws_ec2_info{").count(), 2);
}

#[tokio::test]
async fn health_reports_snapshot_counts() {
    let app = build_http_app(scraped_state().await);

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);

    let health: Value = serde_json::from_str(&body).expect("health should be json");
    assert_eq!(health["status"], "ok");
    assert_eq!(health["resource_count"], 2);
    assert_eq!(health["metric_count"], 2);
    assert!(health["last_scrape"].is_string());
    assert!(health["uptime_secs"].as_i64().is_some_and(|s| s >= 0));
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
}
