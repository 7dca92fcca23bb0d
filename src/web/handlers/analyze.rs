// POST /v1/analyze — moderate one image/text pair.
//
// 400 for invalid input, 502/504 when an analyzer fails. A decision that
// could not be persisted is still returned, with `persisted: false`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::pipeline::orchestrator::{ModerationOutcome, ModerationRequest};
use crate::scoring::context::ContextMap;
use crate::scoring::fusion::RuleHit;
use crate::signals::traits::Sentiment;
use crate::web::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
    /// Base64 image, optionally as a data URL
    #[serde(alias = "image")]
    pub image_data: String,
    #[serde(alias = "text")]
    pub text_content: String,
    #[serde(default)]
    pub context: Option<ContextMap>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub analysis_id: String,
    /// Same value as analysis_id; pass it back as feedback's prediction_id
    pub prediction_id: String,
    pub risk_score: f64,
    pub needs_review: bool,
    pub risk_tier: &'static str,
    pub image_categories: Vec<String>,
    pub text_sentiment: Sentiment,
    pub unsafe_found: Vec<String>,
    pub explanation: String,
    pub rules_fired: Vec<RuleHit>,
    pub persisted: bool,
    pub processing_time_ms: u64,
    pub feedback_endpoint: &'static str,
}

impl From<ModerationOutcome> for AnalyzeResponse {
    fn from(outcome: ModerationOutcome) -> Self {
        let d = outcome.decision;
        Self {
            prediction_id: d.analysis_id.clone(),
            analysis_id: d.analysis_id,
            risk_score: d.risk_score,
            needs_review: d.needs_review,
            risk_tier: d.tier.key(),
            image_categories: d.image_categories,
            text_sentiment: d.text_sentiment,
            unsafe_found: d.unsafe_terms,
            explanation: d.explanation,
            rules_fired: d.rules_fired,
            persisted: outcome.persisted,
            processing_time_ms: outcome.processing_time_ms,
            feedback_endpoint: "/v1/feedback",
        }
    }
}

pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(body) = payload?;

    let request = ModerationRequest::from_base64(
        &body.image_data,
        body.text_content,
        body.context.unwrap_or_default(),
    )?;

    let outcome = state.orchestrator.handle(request).await?;
    Ok(Json(outcome.into()))
}
