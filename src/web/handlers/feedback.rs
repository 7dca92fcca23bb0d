// Feedback routes.
//
// POST /v1/feedback        store one feedback event (200, stored may be false)
// GET  /v1/feedback-stats  coordinator counters
// POST /v1/retrain         202 Accepted, or 409 Conflict if a run is active

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::db::models::{FeedbackEvent, Verdict};
use crate::feedback::FeedbackStats;
use crate::web::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct FeedbackBody {
    pub prediction_id: String,
    /// `true`/`false` or "correct" / "partial" / "incorrect"
    #[serde(alias = "user_feedback")]
    pub verdict: Verdict,
    #[serde(default, alias = "actual_risk_score")]
    pub corrected_risk_score: Option<f64>,
    #[serde(default)]
    pub corrected_flags: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl From<FeedbackBody> for FeedbackEvent {
    fn from(body: FeedbackBody) -> Self {
        let mut event = FeedbackEvent::new(body.prediction_id, body.verdict);
        event.corrected_risk_score = body.corrected_risk_score;
        event.corrected_flags = body.corrected_flags;
        event.metadata = body.metadata;
        event
    }
}

pub async fn submit(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let receipt = state.coordinator.submit(body.into()).await?;

    let (status, message) = match (receipt.stored, receipt.retraining_triggered) {
        (false, _) => ("feedback_not_stored", "Feedback could not be stored"),
        (true, true) => (
            "feedback_stored_retraining_triggered",
            "Feedback stored and model retraining started",
        ),
        (true, false) => ("feedback_stored", "Thank you for your feedback"),
    };

    Ok(Json(serde_json::json!({
        "stored": receipt.stored,
        "retraining_triggered": receipt.retraining_triggered,
        "feedback_count": receipt.feedback_count,
        "status": status,
        "message": message,
    })))
}

pub async fn stats(State(state): State<AppState>) -> Json<FeedbackStats> {
    Json(state.coordinator.stats().await)
}

pub async fn retrain(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.coordinator.retrain().await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "status": "retraining_started",
            "message": "Manual retraining initiated",
        })),
    ))
}
