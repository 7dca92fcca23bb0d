// Feedback coordinator — stores reviewer feedback and decides when to retrain.
//
// Counters and the in-flight flag live behind one tokio Mutex, so the
// "threshold reached and nothing running -> start a run" check happens
// atomically with every counter update. The lock is never held across an
// .await on the store or the retrainer.
//
// Only one retraining run can be active at a time. A manual trigger while
// a run is active is rejected, never queued.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::retrain::{Modality, Retrainer};
use crate::db::models::{FeedbackEvent, FeedbackSummary};
use crate::db::FeedbackStore;
use crate::error::FeedbackError;
use crate::metrics::{Component, Metrics};
use crate::pipeline::health::ComponentHealth;

/// Feedback total at the most recent trigger. `pending` is derived from it
/// on startup so a restart does not lose progress toward the threshold.
pub const CHECKPOINT_KEY: &str = "retraining_checkpoint";
/// RFC 3339 time of the last successful run.
pub const LAST_RETRAINING_KEY: &str = "last_retraining_at";

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Pending feedback count that triggers a run.
    pub threshold: u64,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self { threshold: 100 }
    }
}

#[derive(Debug, Default)]
struct RetrainingState {
    total: u64,
    pending: u64,
    in_flight: bool,
    runs: u64,
    failures: u64,
    last_started_at: Option<DateTime<Utc>>,
    last_completed_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl RetrainingState {
    /// Claim the in-flight flag. Returns the checkpoint to persist.
    fn begin_run(&mut self) -> u64 {
        self.in_flight = true;
        self.pending = 0;
        self.last_started_at = Some(Utc::now());
        self.total
    }
}

/// Snapshot of the coordinator's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackStats {
    pub total: u64,
    /// Feedback accepted since the last trigger.
    pub pending: u64,
    pub threshold: u64,
    pub in_flight: bool,
    /// Successful runs since startup.
    pub runs: u64,
    /// Failed runs since startup.
    pub failures: u64,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Result of a feedback submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    /// False when the feedback store write failed. The event is not counted.
    pub stored: bool,
    pub retraining_triggered: bool,
    pub feedback_count: u64,
}

pub struct FeedbackCoordinator {
    store: Arc<dyn FeedbackStore>,
    retrainer: Arc<dyn Retrainer>,
    metrics: Arc<Metrics>,
    settings: CoordinatorSettings,
    state: Arc<Mutex<RetrainingState>>,
}

impl FeedbackCoordinator {
    /// Build a coordinator, restoring the counters from the store.
    pub async fn initialize(
        store: Arc<dyn FeedbackStore>,
        retrainer: Arc<dyn Retrainer>,
        metrics: Arc<Metrics>,
        settings: CoordinatorSettings,
    ) -> Result<Self> {
        let total = store
            .feedback_count()
            .await
            .context("Failed to count stored feedback")?;

        let checkpoint = match store.get_state(CHECKPOINT_KEY).await? {
            Some(value) => value
                .parse::<u64>()
                .with_context(|| format!("Corrupt {CHECKPOINT_KEY} value: {value}"))?,
            None => 0,
        };

        let last_completed_at = store
            .get_state(LAST_RETRAINING_KEY)
            .await?
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let state = RetrainingState {
            total,
            pending: total.saturating_sub(checkpoint),
            last_completed_at,
            ..Default::default()
        };

        info!(
            total = state.total,
            pending = state.pending,
            threshold = settings.threshold,
            "Feedback coordinator ready"
        );

        Ok(Self {
            store,
            retrainer,
            metrics,
            settings,
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Store one feedback event and trigger retraining when the pending
    /// count reaches the threshold.
    pub async fn submit(&self, event: FeedbackEvent) -> Result<SubmitReceipt, FeedbackError> {
        validate(&event)?;

        let started = Instant::now();
        let key = event.storage_key();

        if let Err(e) = self.store.append_feedback(&key, &event).await {
            warn!(
                prediction_id = %event.prediction_id,
                error = %e,
                "Failed to store feedback"
            );
            self.metrics
                .record(Component::Feedback, started.elapsed(), false);
            let feedback_count = self.state.lock().await.total;
            return Ok(SubmitReceipt {
                stored: false,
                retraining_triggered: false,
                feedback_count,
            });
        }

        let (checkpoint, feedback_count) = {
            let mut state = self.state.lock().await;
            state.total += 1;
            state.pending += 1;
            let checkpoint = if state.pending >= self.settings.threshold && !state.in_flight {
                Some(state.begin_run())
            } else {
                None
            };
            (checkpoint, state.total)
        };

        self.metrics
            .record(Component::Feedback, started.elapsed(), true);

        let retraining_triggered = match checkpoint {
            Some(checkpoint) => {
                info!(
                    feedback_count,
                    threshold = self.settings.threshold,
                    "Feedback threshold reached, starting retraining"
                );
                self.metrics.record_retraining_trigger();
                self.spawn_run(checkpoint);
                true
            }
            None => false,
        };

        Ok(SubmitReceipt {
            stored: true,
            retraining_triggered,
            feedback_count,
        })
    }

    /// Start a retraining run now. Fails if one is already running.
    pub async fn retrain(&self) -> Result<JoinHandle<()>, FeedbackError> {
        let checkpoint = {
            let mut state = self.state.lock().await;
            if state.in_flight {
                return Err(FeedbackError::RetrainingInFlight);
            }
            state.begin_run()
        };

        info!("Manual retraining requested");
        self.metrics.record_retraining_trigger();
        Ok(self.spawn_run(checkpoint))
    }

    pub async fn stats(&self) -> FeedbackStats {
        let state = self.state.lock().await;
        FeedbackStats {
            total: state.total,
            pending: state.pending,
            threshold: self.settings.threshold,
            in_flight: state.in_flight,
            runs: state.runs,
            failures: state.failures,
            last_started_at: state.last_started_at,
            last_completed_at: state.last_completed_at,
            last_error: state.last_error.clone(),
        }
    }

    /// Unhealthy when the store is unreachable, degraded when the most
    /// recent retraining run failed.
    pub async fn health(&self) -> ComponentHealth {
        if let Err(e) = self.store.feedback_count().await {
            return ComponentHealth::unhealthy(format!("feedback store: {e}"));
        }
        match self.state.lock().await.last_error.clone() {
            Some(err) => ComponentHealth::degraded(format!("last retraining run failed: {err}")),
            None => ComponentHealth::healthy(),
        }
    }

    /// Run the phases in a detached task. The in-flight flag must already
    /// be claimed; the task always releases it.
    fn spawn_run(&self, checkpoint: u64) -> JoinHandle<()> {
        let store = self.store.clone();
        let retrainer = self.retrainer.clone();
        let metrics = self.metrics.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            if let Err(e) = store.set_state(CHECKPOINT_KEY, &checkpoint.to_string()).await {
                warn!(error = %e, "Failed to save retraining checkpoint");
            }

            // Run the phases in their own task so a panic is reported like
            // any other failure and the flag is still released.
            let outcome = match tokio::spawn(run_phases(store.clone(), retrainer)).await {
                Ok(result) => result,
                Err(join_err) => Err(anyhow::anyhow!("retraining task aborted: {join_err}")),
            };

            let finished_at = Utc::now();
            match outcome {
                Ok(data) => {
                    info!(samples = data.total, "Retraining run completed");
                    if let Err(e) = store
                        .set_state(LAST_RETRAINING_KEY, &finished_at.to_rfc3339())
                        .await
                    {
                        warn!(error = %e, "Failed to record retraining completion");
                    }
                    let mut s = state.lock().await;
                    s.in_flight = false;
                    s.runs += 1;
                    s.last_completed_at = Some(finished_at);
                    s.last_error = None;
                }
                Err(e) => {
                    error!(error = %e, "Retraining run failed");
                    metrics.record_retraining_failure();
                    let mut s = state.lock().await;
                    s.in_flight = false;
                    s.failures += 1;
                    s.last_error = Some(format!("{e:#}"));
                }
            }
        })
    }
}

async fn run_phases(
    store: Arc<dyn FeedbackStore>,
    retrainer: Arc<dyn Retrainer>,
) -> Result<FeedbackSummary> {
    let data = retrainer
        .collect_training_data(store.as_ref())
        .await
        .context("data collection failed")?;

    for modality in Modality::ALL {
        retrainer
            .retrain(modality, &data)
            .await
            .with_context(|| format!("{modality} retraining failed"))?;
    }

    retrainer
        .complete(&data)
        .await
        .context("model activation failed")?;
    Ok(data)
}

fn validate(event: &FeedbackEvent) -> Result<(), FeedbackError> {
    if event.prediction_id.trim().is_empty() {
        return Err(FeedbackError::InvalidInput(
            "prediction_id is required".to_string(),
        ));
    }
    if let Some(score) = event.corrected_risk_score {
        if !(0.0..=1.0).contains(&score) {
            return Err(FeedbackError::InvalidInput(format!(
                "corrected risk score {score} is outside [0, 1]"
            )));
        }
    }
    Ok(())
}
