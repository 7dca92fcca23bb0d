// Database schema — table creation.
//
// A `schema_version` table records the schema version a database was
// created with. Future migrations append versions after 1.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// This is idempotent — safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per fused decision, keyed by analysis_id
        CREATE TABLE IF NOT EXISTS moderation_results (
            analysis_id TEXT PRIMARY KEY,
            risk_score REAL NOT NULL CHECK (risk_score >= 0.0 AND risk_score <= 1.0),
            needs_review INTEGER NOT NULL,
            risk_tier TEXT NOT NULL,
            explanation TEXT NOT NULL,
            image_categories TEXT NOT NULL,    -- JSON array, top 3
            text_sentiment TEXT NOT NULL,
            unsafe_terms TEXT NOT NULL,        -- JSON array
            moderation_flagged INTEGER NOT NULL,
            context_score REAL,
            rules_fired TEXT NOT NULL,         -- JSON array of {rule, contribution}
            created_at TEXT NOT NULL
        );

        -- Append-only feedback log. storage_key is not unique: repeated
        -- feedback for the same prediction on the same day adds a new row.
        CREATE TABLE IF NOT EXISTS feedback_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            storage_key TEXT NOT NULL,
            prediction_id TEXT NOT NULL,
            verdict TEXT NOT NULL,             -- correct / partial / incorrect
            corrected_risk_score REAL,
            payload TEXT NOT NULL,             -- full event as JSON
            submitted_at TEXT NOT NULL
        );

        -- Coordinator bookkeeping (retraining checkpoint, last run times)
        CREATE TABLE IF NOT EXISTS service_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_results_review
            ON moderation_results(needs_review);

        CREATE INDEX IF NOT EXISTS idx_feedback_prediction
            ON feedback_events(prediction_id);

        -- Date-prefixed storage key lookups
        CREATE INDEX IF NOT EXISTS idx_feedback_key
            ON feedback_events(storage_key);
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
