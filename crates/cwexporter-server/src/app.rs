use crate::exposition;
use crate::state::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub version: String,
    /// "ok" once a snapshot exists, "starting" before
    pub status: &'static str,
    pub uptime_secs: i64,
    pub last_scrape: Option<DateTime<Utc>>,
    pub resource_count: usize,
    pub metric_count: usize,
}

pub fn build_http_app(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .with_state(state)
}

async fn metrics(State(state): State<AppState>) -> Response {
    let Some(snapshot) = state.latest() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "first scrape has not completed yet\n",
        )
            .into_response();
    };

    match exposition::render(&snapshot) {
        Ok(body) => ([(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics\n").into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.latest();
    Json(HealthResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: if snapshot.is_some() { "ok" } else { "starting" },
        uptime_secs: (Utc::now() - state.start_time).num_seconds(),
        last_scrape: snapshot.as_ref().and_then(|s| s.collected_at),
        resource_count: snapshot.as_ref().map_or(0, |s| s.resources.len()),
        metric_count: snapshot.as_ref().map_or(0, |s| s.metrics.len()),
    })
}
