// Web server — Axum JSON API in front of the orchestrator and the
// feedback coordinator.
//
// Routes:
//   POST /v1/analyze         moderate one image/text pair
//   POST /v1/feedback        submit reviewer feedback
//   GET  /v1/feedback-stats  coordinator counters
//   POST /v1/retrain         manual retraining (202, or 409 when running)
//   GET  /health             aggregated dependency health
//   GET  /metrics            Prometheus text format

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{FailureKind, FeedbackError, ModerationError};
use crate::feedback::FeedbackCoordinator;
use crate::metrics::Metrics;
use crate::pipeline::orchestrator::Orchestrator;

pub mod handlers;

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub coordinator: Arc<FeedbackCoordinator>,
    pub metrics: Arc<Metrics>,
    /// Deadline for each health check
    pub health_timeout: Duration,
}

/// Start the Axum web server and block until it exits.
pub async fn run_server(state: AppState, port: u16, bind: &str) -> Result<()> {
    let app = build_router(state);

    let addr = format!("{bind}:{port}");
    info!("crossmodal API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/v1/analyze", post(handlers::analyze::analyze))
        .route("/v1/feedback", post(handlers::feedback::submit))
        .route("/v1/feedback-stats", get(handlers::feedback::stats))
        .route("/v1/retrain", post(handlers::feedback::retrain));

    let ops = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/metrics", get(handlers::health::metrics));

    Router::new()
        .merge(api)
        .merge(ops)
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// API error rendered as `{"error": {"code", "message"}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 400
    #[error("{0}")]
    BadRequest(String),

    /// 409
    #[error("{0}")]
    Conflict(String),

    /// 502
    #[error("{0}")]
    BadGateway(String),

    /// 504
    #[error("{0}")]
    GatewayTimeout(String),

    /// 500
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "DEPENDENCY_FAILURE", msg),
            ApiError::GatewayTimeout(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, "DEPENDENCY_TIMEOUT", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", msg),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<ModerationError> for ApiError {
    fn from(e: ModerationError) -> Self {
        match e {
            ModerationError::InvalidInput(_) => ApiError::BadRequest(e.to_string()),
            ModerationError::Dependency {
                kind: FailureKind::Timeout,
                ..
            } => ApiError::GatewayTimeout(e.to_string()),
            ModerationError::Dependency { .. } => ApiError::BadGateway(e.to_string()),
        }
    }
}

impl From<FeedbackError> for ApiError {
    fn from(e: FeedbackError) -> Self {
        match e {
            FeedbackError::InvalidInput(_) => ApiError::BadRequest(e.to_string()),
            FeedbackError::RetrainingInFlight => ApiError::Conflict(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}
