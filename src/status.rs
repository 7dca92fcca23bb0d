// System status display — DB size, stored decisions, feedback and
// retraining bookkeeping.

use anyhow::Result;
use std::path::Path;

use crate::db::{FeedbackStore, ResultStore};
use crate::feedback::coordinator::{CHECKPOINT_KEY, LAST_RETRAINING_KEY};

/// Display system status to the terminal.
pub async fn show(
    results: &dyn ResultStore,
    feedback: &dyn FeedbackStore,
    db_display_path: &str,
) -> Result<()> {
    if !Path::new(db_display_path).exists() {
        println!("Database: not initialized");
        println!("\nRun `crossmodal init` to set up the database.");
        return Ok(());
    }

    // Database file size
    let file_size = std::fs::metadata(db_display_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_display_path, file_size);

    let decisions = results.decision_stats().await?;
    println!(
        "Decisions: {} total, {} flagged for review",
        decisions.total, decisions.needs_review
    );

    let summary = feedback.feedback_summary().await?;
    if summary.total == 0 {
        println!("Feedback: none received yet");
    } else {
        println!(
            "Feedback: {} total ({} correct, {} partial, {} incorrect)",
            summary.total, summary.correct, summary.partial, summary.incorrect
        );
    }

    match feedback.get_state(CHECKPOINT_KEY).await? {
        Some(checkpoint) => {
            println!("Retraining checkpoint: {} feedback events", checkpoint);
            if let Some(last) = feedback.get_state(LAST_RETRAINING_KEY).await? {
                println!("Last retraining: {}", last);
            }
        }
        None => {
            println!("Last retraining: never");
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
