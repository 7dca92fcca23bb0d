// Database queries — every SQL statement the stores run.
//
// Keeps SQL contained in one place and gives the rest of the app clean
// Rust interfaces. Decisions and feedback are write-once: no UPDATE or
// DELETE statements touch those tables.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{DecisionStats, FeedbackEvent, FeedbackSummary, RiskDecision};

// --- Moderation results ---

/// Insert a decision. A second insert with the same analysis_id fails.
pub fn insert_decision(conn: &Connection, decision: &RiskDecision) -> Result<()> {
    conn.execute(
        "INSERT INTO moderation_results (
            analysis_id, risk_score, needs_review, risk_tier, explanation,
            image_categories, text_sentiment, unsafe_terms, moderation_flagged,
            context_score, rules_fired, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            decision.analysis_id,
            decision.risk_score,
            decision.needs_review,
            decision.tier.key(),
            decision.explanation,
            serde_json::to_string(&decision.image_categories)?,
            decision.text_sentiment.as_str(),
            serde_json::to_string(&decision.unsafe_terms)?,
            decision.moderation_flagged,
            decision.context_score,
            serde_json::to_string(&decision.rules_fired)?,
            decision.created_at.to_rfc3339(),
        ],
    )
    .with_context(|| format!("Failed to store decision {}", decision.analysis_id))?;
    Ok(())
}

/// Count decisions, total and flagged for review.
pub fn decision_stats(conn: &Connection) -> Result<DecisionStats> {
    let (total, needs_review): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(needs_review), 0) FROM moderation_results",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(DecisionStats {
        total: total as u64,
        needs_review: needs_review as u64,
    })
}

/// Load the stored risk score and review flag for one decision.
#[cfg(test)]
pub(crate) fn get_decision_score(conn: &Connection, analysis_id: &str) -> Result<Option<(f64, bool)>> {
    let mut stmt = conn.prepare(
        "SELECT risk_score, needs_review FROM moderation_results WHERE analysis_id = ?1",
    )?;
    let result = stmt
        .query_row(params![analysis_id], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?;
    Ok(result)
}

// --- Feedback ---

/// Append a feedback event. Always a new row.
pub fn insert_feedback(conn: &Connection, key: &str, event: &FeedbackEvent) -> Result<()> {
    conn.execute(
        "INSERT INTO feedback_events (
            storage_key, prediction_id, verdict, corrected_risk_score, payload, submitted_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            key,
            event.prediction_id,
            event.verdict.as_str(),
            event.corrected_risk_score,
            serde_json::to_string(event)?,
            event.submitted_at.to_rfc3339(),
        ],
    )
    .with_context(|| format!("Failed to store feedback for {}", event.prediction_id))?;
    Ok(())
}

pub fn feedback_count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM feedback_events", [], |row| {
        row.get(0)
    })?;
    Ok(count as u64)
}

pub fn feedback_summary(conn: &Connection) -> Result<FeedbackSummary> {
    let mut summary = FeedbackSummary::default();
    let mut stmt = conn.prepare("SELECT verdict, COUNT(*) FROM feedback_events GROUP BY verdict")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    for row in rows {
        let (verdict, count) = row?;
        let count = count as u64;
        summary.total += count;
        match verdict.as_str() {
            "correct" => summary.correct += count,
            "partial" => summary.partial += count,
            "incorrect" => summary.incorrect += count,
            _ => {}
        }
    }
    Ok(summary)
}

/// All stored events for one prediction, oldest first.
#[cfg(test)]
pub(crate) fn feedback_for_prediction(conn: &Connection, prediction_id: &str) -> Result<Vec<FeedbackEvent>> {
    let mut stmt = conn.prepare(
        "SELECT payload FROM feedback_events WHERE prediction_id = ?1 ORDER BY id ASC",
    )?;
    let payloads = stmt
        .query_map(params![prediction_id], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    payloads
        .iter()
        .map(|json| serde_json::from_str(json).context("Corrupt feedback payload"))
        .collect()
}

// --- Service state ---

/// Get a state value by key (e.g., "retraining_checkpoint").
pub fn get_state(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM service_state WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get(0)).optional()?;
    Ok(result)
}

/// Set a state value (upsert).
pub fn set_state(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO service_state (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}
