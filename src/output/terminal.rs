// Colored terminal output for decisions, feedback stats and health.
//
// main.rs delegates all display formatting here.

use colored::Colorize;

use crate::db::models::RiskTier;
use crate::feedback::{FeedbackStats, SubmitReceipt};
use crate::pipeline::health::{HealthReport, HealthState};
use crate::pipeline::orchestrator::ModerationOutcome;

/// Display one moderation decision.
pub fn display_decision(outcome: &ModerationOutcome, text: &str) {
    let d = &outcome.decision;

    println!("\n{}", format!("=== Decision {} ===", d.analysis_id).bold());
    println!("  Text: {}", super::truncate_chars(text, 100).dimmed());
    println!(
        "  Risk score: {:.3}  Tier: {}",
        d.risk_score,
        colorize_tier(d.tier)
    );

    let review = if d.needs_review {
        "yes".red().bold().to_string()
    } else {
        "no".green().to_string()
    };
    println!("  Needs review: {}", review);
    println!("  {}", d.explanation);

    println!("\n  Signals:");
    let categories = if d.image_categories.is_empty() {
        "none".to_string()
    } else {
        d.image_categories.join(", ")
    };
    println!("    Image categories: {}", categories);
    if d.moderation_flagged {
        println!("    Image moderation: {}", "flagged".red());
    }
    println!("    Text sentiment: {}", d.text_sentiment);
    if !d.unsafe_terms.is_empty() {
        println!("    Unsafe terms: {}", d.unsafe_terms.join(", ").yellow());
    }
    if let Some(ctx) = d.context_score {
        println!("    Context: {:.2}", ctx);
    }

    if !d.rules_fired.is_empty() {
        println!("\n  Rules fired:");
        for hit in &d.rules_fired {
            let contribution = format!("{:+.2}", hit.contribution);
            let contribution = if hit.contribution < 0.0 {
                contribution.green()
            } else {
                contribution.red()
            };
            println!("    {:<48} {}", hit.rule.as_str(), contribution);
        }
    }

    if !outcome.persisted {
        println!(
            "\n  {} Decision was not saved to the result store (see logs)",
            "!".yellow()
        );
    }
    println!("  Processed in {} ms", outcome.processing_time_ms);
}

/// Display the result of a feedback submission.
pub fn display_receipt(receipt: &SubmitReceipt) {
    if !receipt.stored {
        println!("{} Feedback could not be stored (see logs)", "!!".red().bold());
        return;
    }
    println!("Feedback stored ({} total)", receipt.feedback_count);
    if receipt.retraining_triggered {
        println!("  {} Threshold reached, retraining started", "->".cyan());
    }
}

/// Display the coordinator's counters.
pub fn display_feedback_stats(stats: &FeedbackStats) {
    println!("\n{}", "=== Feedback ===".bold());
    println!("  Total feedback: {}", stats.total);
    println!("  Pending: {}/{}", stats.pending, stats.threshold);

    let running = if stats.in_flight {
        "running".cyan().to_string()
    } else {
        "idle".normal().to_string()
    };
    println!("  Retraining: {}", running);
    println!(
        "  Runs: {} completed, {} failed",
        stats.runs, stats.failures
    );
    if let Some(at) = stats.last_completed_at {
        println!("  Last completed: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(err) = &stats.last_error {
        println!("  Last error: {}", err.red());
    }
}

/// Display an aggregated health report.
pub fn display_health(report: &HealthReport) {
    println!(
        "\n{} {}",
        "=== Health ===".bold(),
        colorize_health(report.status)
    );
    for (name, component) in &report.components {
        match &component.detail {
            Some(detail) => println!(
                "  {:<16} {}  {}",
                name,
                colorize_health(component.status),
                detail.dimmed()
            ),
            None => println!("  {:<16} {}", name, colorize_health(component.status)),
        }
    }
}

fn colorize_tier(tier: RiskTier) -> colored::ColoredString {
    let label = tier.as_str();
    match tier {
        RiskTier::High => label.red().bold(),
        RiskTier::Medium => label.yellow(),
        RiskTier::Low => label.green(),
        RiskTier::VeryLow => label.dimmed(),
    }
}

fn colorize_health(state: HealthState) -> colored::ColoredString {
    match state {
        HealthState::Healthy => state.as_str().green(),
        HealthState::Degraded => state.as_str().yellow(),
        HealthState::Unhealthy => state.as_str().red().bold(),
    }
}
