// Store traits — backend-agnostic async interfaces for persistence.
//
// Implementors: SqliteStore (wraps rusqlite), MemoryStore (tests and builds
// without the `sqlite` feature). Both stores are append/put only from the pipeline's point
// of view; nothing here updates or deletes a decision or a feedback event.
// Stores synchronise themselves, so callers never lock around them.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{DecisionStats, FeedbackEvent, FeedbackSummary, RiskDecision};

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persist a decision keyed by its analysis_id. Fails on a duplicate id.
    async fn put_decision(&self, decision: &RiskDecision) -> Result<()>;

    /// Count stored decisions (total and flagged for review).
    async fn decision_stats(&self) -> Result<DecisionStats>;
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Append a feedback event under `key`. Never overwrites an earlier event,
    /// even one with the same key.
    async fn append_feedback(&self, key: &str, event: &FeedbackEvent) -> Result<()>;

    /// Total number of stored feedback events.
    async fn feedback_count(&self) -> Result<u64>;

    /// Verdict breakdown of all stored feedback.
    async fn feedback_summary(&self) -> Result<FeedbackSummary>;

    /// Get a coordinator state value by key (e.g. "retraining_checkpoint").
    async fn get_state(&self, key: &str) -> Result<Option<String>>;

    /// Set a coordinator state value (upsert).
    async fn set_state(&self, key: &str, value: &str) -> Result<()>;
}
