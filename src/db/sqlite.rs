// SqliteStore — rusqlite backend implementing both store traits.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across an .await point.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{DecisionStats, FeedbackEvent, FeedbackSummary, RiskDecision};
use super::traits::{FeedbackStore, ResultStore};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Count user tables (for `init` confirmation).
    pub async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    /// Stored score and review flag for one decision, if present.
    #[cfg(test)]
    pub(crate) async fn decision_score(&self, analysis_id: &str) -> Result<Option<(f64, bool)>> {
        let conn = self.conn.lock().await;
        super::queries::get_decision_score(&conn, analysis_id)
    }

    /// Every stored feedback event for one prediction, oldest first.
    #[cfg(test)]
    pub(crate) async fn feedback_for_prediction(&self, prediction_id: &str) -> Result<Vec<FeedbackEvent>> {
        let conn = self.conn.lock().await;
        super::queries::feedback_for_prediction(&conn, prediction_id)
    }
}

#[async_trait]
impl ResultStore for SqliteStore {
    async fn put_decision(&self, decision: &RiskDecision) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::insert_decision(&conn, decision)
    }

    async fn decision_stats(&self) -> Result<DecisionStats> {
        let conn = self.conn.lock().await;
        super::queries::decision_stats(&conn)
    }
}

#[async_trait]
impl FeedbackStore for SqliteStore {
    async fn append_feedback(&self, key: &str, event: &FeedbackEvent) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::insert_feedback(&conn, key, event)
    }

    async fn feedback_count(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        super::queries::feedback_count(&conn)
    }

    async fn feedback_summary(&self) -> Result<FeedbackSummary> {
        let conn = self.conn.lock().await;
        super::queries::feedback_summary(&conn)
    }

    async fn get_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        super::queries::get_state(&conn, key)
    }

    async fn set_state(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::set_state(&conn, key, value)
    }
}
