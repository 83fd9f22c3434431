use anyhow::Result;
use cwexporter_scrape::aws::AwsClientFactory;
use cwexporter_scrape::orchestrator::Orchestrator;
use cwexporter_scrape::services::ServiceRegistry;
use cwexporter_server::app;
use cwexporter_server::config::ExporterConfig;
use cwexporter_server::scheduler::SnapshotScheduler;
use cwexporter_server::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cwexporter=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("config/exporter.toml");

    let config = ExporterConfig::load(config_path)?;
    let registry = Arc::new(ServiceRegistry::default());
    config.validate(&registry)?;
    tracing::info!(
        config = config_path,
        http_port = config.http_port,
        "Configuration loaded"
    );

    let factory = Arc::new(AwsClientFactory::new(registry.clone()));
    let orchestrator = Orchestrator::new(factory, config.limits()).with_registry(registry);

    let state = AppState::new();
    let scheduler = SnapshotScheduler::new(
        orchestrator,
        config.scrape_config(),
        state.clone(),
        config.scrape_interval_secs,
    );
    let scheduler_handle = tokio::spawn(async move { scheduler.run().await });

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(%http_addr, "HTTP server listening");
    let http_server = axum::serve(listener, app::build_http_app(state));

    tokio::select! {
        result = http_server.with_graceful_shutdown(async { signal::ctrl_c().await.ok(); }) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    scheduler_handle.abort();
    Ok(())
}
