use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_IMAGE_URL: &str = "http://image-service:8001";
pub const DEFAULT_TEXT_URL: &str = "http://text-service:8002";
pub const DEFAULT_DB_PATH: &str = "./crossmodal.db";

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. Every
/// setting has a default; a value that is set but unparsable is an error.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the image analysis service
    pub image_url: String,
    /// Base URL of the text analysis service
    pub text_url: String,
    pub db_path: String,
    /// Deadline for each analyzer call
    pub signal_timeout: Duration,
    /// Deadline for each health check
    pub health_timeout: Duration,
    /// Pending feedback count that triggers retraining
    pub retrain_threshold: u64,
    /// Unit delay of the simulated retraining phases
    pub retrain_phase_delay: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        let retrain_threshold = parse_var("CROSSMODAL_RETRAIN_THRESHOLD", 100)?;
        if retrain_threshold == 0 {
            anyhow::bail!("CROSSMODAL_RETRAIN_THRESHOLD must be at least 1");
        }

        let signal_timeout_ms = parse_var("CROSSMODAL_SIGNAL_TIMEOUT_MS", 10_000)?;
        let health_timeout_ms = parse_var("CROSSMODAL_HEALTH_TIMEOUT_MS", 2_000)?;
        if signal_timeout_ms == 0 || health_timeout_ms == 0 {
            anyhow::bail!("Timeouts must be greater than zero");
        }

        Ok(Self {
            image_url: url_var("CROSSMODAL_IMAGE_URL", DEFAULT_IMAGE_URL),
            text_url: url_var("CROSSMODAL_TEXT_URL", DEFAULT_TEXT_URL),
            db_path: env::var("CROSSMODAL_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string()),
            signal_timeout: Duration::from_millis(signal_timeout_ms),
            health_timeout: Duration::from_millis(health_timeout_ms),
            retrain_threshold,
            retrain_phase_delay: Duration::from_millis(parse_var(
                "CROSSMODAL_RETRAIN_PHASE_MS",
                1_000,
            )?),
        })
    }
}

/// Service base URL without a trailing slash.
fn url_var(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
        .trim()
        .trim_end_matches('/')
        .to_string()
}

fn parse_var(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a non-negative integer, got `{raw}`")),
        Err(_) => Ok(default),
    }
}
