// Aggregated health — probes every dependency and folds the answers into
// one report for GET /health and `crossmodal health`.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tokio::time::error::Elapsed;

use crate::feedback::coordinator::FeedbackCoordinator;
use crate::pipeline::orchestrator::Orchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentHealth {
    pub status: HealthState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            status: HealthState::Healthy,
            detail: None,
        }
    }

    pub fn degraded(detail: impl Into<String>) -> Self {
        Self {
            status: HealthState::Degraded,
            detail: Some(detail.into()),
        }
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            status: HealthState::Unhealthy,
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Healthy only when every component is.
    pub status: HealthState,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthReport {
    pub fn from_components(components: BTreeMap<String, ComponentHealth>) -> Self {
        let status = if components
            .values()
            .all(|c| c.status == HealthState::Healthy)
        {
            HealthState::Healthy
        } else {
            HealthState::Degraded
        };
        Self { status, components }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }
}

const TIMED_OUT: &str = "health check timed out";

fn analyzer(answer: Result<bool, Elapsed>) -> ComponentHealth {
    match answer {
        Ok(true) => ComponentHealth::healthy(),
        Ok(false) => ComponentHealth::unhealthy("health check failed"),
        Err(_) => ComponentHealth::unhealthy(TIMED_OUT),
    }
}

/// Check analyzers, the result store and the feedback coordinator
/// concurrently. Every check gets `check_timeout`, independent of the
/// analysis deadline.
pub async fn check(
    orchestrator: &Orchestrator,
    coordinator: &FeedbackCoordinator,
    check_timeout: Duration,
) -> HealthReport {
    let image_check = tokio::time::timeout(check_timeout, orchestrator.image_analyzer().health());
    let text_check = tokio::time::timeout(check_timeout, orchestrator.text_analyzer().health());
    let results_check =
        tokio::time::timeout(check_timeout, orchestrator.result_store().decision_stats());
    let feedback_check = tokio::time::timeout(check_timeout, coordinator.health());

    let (image, text, results, feedback) =
        futures::join!(image_check, text_check, results_check, feedback_check);

    let mut components = BTreeMap::new();
    components.insert("image_service".to_string(), analyzer(image));
    components.insert("text_service".to_string(), analyzer(text));
    components.insert(
        "result_store".to_string(),
        match results {
            Ok(Ok(_)) => ComponentHealth::healthy(),
            Ok(Err(e)) => ComponentHealth::unhealthy(e.to_string()),
            Err(_) => ComponentHealth::unhealthy(TIMED_OUT),
        },
    );
    components.insert(
        "feedback".to_string(),
        feedback.unwrap_or_else(|_| ComponentHealth::unhealthy(TIMED_OUT)),
    );

    HealthReport::from_components(components)
}
