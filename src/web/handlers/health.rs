// GET /health — aggregated dependency health. Always 200; the body says
// whether the service is healthy or degraded.
// GET /metrics — Prometheus text exposition.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;

use crate::pipeline::health::{self, HealthReport};
use crate::web::{ApiError, AppState};

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(health::check(&state.orchestrator, &state.coordinator, state.health_timeout).await)
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .metrics
        .render_prometheus()
        .map_err(|e| ApiError::Internal(format!("{e:#}")))?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}
