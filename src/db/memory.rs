// MemoryStore — in-process store for tests and builds without the `sqlite`
// feature.
//
// Same contract as SqliteStore: decisions are write-once by analysis_id,
// feedback is append-only. Nothing survives a restart.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::models::{DecisionStats, FeedbackEvent, FeedbackSummary, RiskDecision, Verdict};
use super::traits::{FeedbackStore, ResultStore};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    decisions: HashMap<String, RiskDecision>,
    feedback: Vec<(String, FeedbackEvent)>,
    state: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a stored decision.
    pub async fn decision(&self, analysis_id: &str) -> Option<RiskDecision> {
        self.inner.lock().await.decisions.get(analysis_id).cloned()
    }

    /// Stored feedback as (key, event) pairs, in append order.
    pub async fn feedback_entries(&self) -> Vec<(String, FeedbackEvent)> {
        self.inner.lock().await.feedback.clone()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn put_decision(&self, decision: &RiskDecision) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.decisions.contains_key(&decision.analysis_id) {
            anyhow::bail!("Decision {} already stored", decision.analysis_id);
        }
        inner
            .decisions
            .insert(decision.analysis_id.clone(), decision.clone());
        Ok(())
    }

    async fn decision_stats(&self) -> Result<DecisionStats> {
        let inner = self.inner.lock().await;
        Ok(DecisionStats {
            total: inner.decisions.len() as u64,
            needs_review: inner.decisions.values().filter(|d| d.needs_review).count() as u64,
        })
    }
}

#[async_trait]
impl FeedbackStore for MemoryStore {
    async fn append_feedback(&self, key: &str, event: &FeedbackEvent) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.feedback.push((key.to_string(), event.clone()));
        Ok(())
    }

    async fn feedback_count(&self) -> Result<u64> {
        Ok(self.inner.lock().await.feedback.len() as u64)
    }

    async fn feedback_summary(&self) -> Result<FeedbackSummary> {
        let inner = self.inner.lock().await;
        let mut summary = FeedbackSummary::default();
        for (_, event) in &inner.feedback {
            summary.total += 1;
            match event.verdict {
                Verdict::Correct => summary.correct += 1,
                Verdict::Partial => summary.partial += 1,
                Verdict::Incorrect => summary.incorrect += 1,
            }
        }
        Ok(summary)
    }

    async fn get_state(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.lock().await.state.get(key).cloned())
    }

    async fn set_state(&self, key: &str, value: &str) -> Result<()> {
        self.inner
            .lock()
            .await
            .state
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
