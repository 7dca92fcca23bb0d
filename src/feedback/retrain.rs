// Retrainer trait — the model update pipeline the coordinator drives.
//
// A run has three sequential phases: collect training data from the
// feedback store, retrain each modality in turn, then complete (activate
// the new models). The coordinator owns scheduling and bookkeeping; a
// Retrainer only does the work.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::db::models::FeedbackSummary;
use crate::db::FeedbackStore;

/// The models a retraining run updates, in the order they are retrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Image,
    Text,
    Risk,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Image, Modality::Text, Modality::Risk];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Image => "image",
            Modality::Text => "text",
            Modality::Risk => "risk",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[async_trait]
pub trait Retrainer: Send + Sync {
    /// Gather the training set. Defaults to the store's verdict breakdown.
    async fn collect_training_data(&self, store: &dyn FeedbackStore) -> Result<FeedbackSummary> {
        store.feedback_summary().await
    }

    /// Retrain one modality on the collected data.
    async fn retrain(&self, modality: Modality, data: &FeedbackSummary) -> Result<()>;

    /// Activate the retrained models.
    async fn complete(&self, data: &FeedbackSummary) -> Result<()>;
}

/// Stand-in retrainer that only waits, one `phase_delay` unit per step:
/// collection 1, image 2, text 2, risk 1.
pub struct SimulatedRetrainer {
    phase_delay: Duration,
}

impl SimulatedRetrainer {
    pub fn new(phase_delay: Duration) -> Self {
        Self { phase_delay }
    }

    fn units(modality: Modality) -> u32 {
        match modality {
            Modality::Image | Modality::Text => 2,
            Modality::Risk => 1,
        }
    }
}

impl Default for SimulatedRetrainer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl Retrainer for SimulatedRetrainer {
    async fn collect_training_data(&self, store: &dyn FeedbackStore) -> Result<FeedbackSummary> {
        let summary = store.feedback_summary().await?;
        tokio::time::sleep(self.phase_delay).await;
        info!(
            samples = summary.total,
            correct = summary.correct,
            incorrect = summary.incorrect,
            "Collected feedback for retraining"
        );
        Ok(summary)
    }

    async fn retrain(&self, modality: Modality, data: &FeedbackSummary) -> Result<()> {
        info!(modality = %modality, samples = data.total, "Retraining model");
        tokio::time::sleep(self.phase_delay * Self::units(modality)).await;
        Ok(())
    }

    async fn complete(&self, _data: &FeedbackSummary) -> Result<()> {
        info!("Retrained models are now active");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::models::{FeedbackEvent, Verdict};

    #[tokio::test]
    async fn test_simulated_run_takes_six_phase_units() {
        let store = MemoryStore::new();
        let event = FeedbackEvent::new("mod_a", Verdict::Correct);
        store.append_feedback(&event.storage_key(), &event).await.unwrap();

        let retrainer = SimulatedRetrainer::new(Duration::from_millis(10));
        let started = std::time::Instant::now();

        let data = retrainer.collect_training_data(&store).await.unwrap();
        for modality in Modality::ALL {
            retrainer.retrain(modality, &data).await.unwrap();
        }
        retrainer.complete(&data).await.unwrap();

        assert_eq!(data.total, 1);
        assert!(started.elapsed() >= Duration::from_millis(60));
    }
}
