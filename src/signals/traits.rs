// Signal analyzer traits — the seam between the pipeline and the external
// image and text capabilities.
//
// The orchestrator only ever sees these traits. The HTTP adapters in
// image.rs and text.rs implement them against the analysis services;
// tests swap in in-process fakes.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured output of the image capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSignal {
    /// Category labels in confidence order, deduplicated.
    pub categories: Vec<String>,
    pub moderation_flagged: bool,
    pub moderation_labels: Vec<String>,
}

impl ImageSignal {
    /// Build a signal, dropping repeated categories but keeping rank order.
    pub fn new(
        categories: Vec<String>,
        moderation_flagged: bool,
        moderation_labels: Vec<String>,
    ) -> Self {
        let mut seen = std::collections::HashSet::new();
        let categories = categories
            .into_iter()
            .filter(|c| seen.insert(c.clone()))
            .collect();
        Self {
            categories,
            moderation_flagged,
            moderation_labels,
        }
    }

    /// The `n` highest-ranked categories.
    pub fn top_categories(&self, n: usize) -> Vec<String> {
        self.categories.iter().take(n).cloned().collect()
    }
}

/// Sentiment class reported by the text capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    #[serde(alias = "Positive", alias = "positive")]
    Positive,
    #[serde(alias = "Negative", alias = "negative")]
    Negative,
    #[serde(alias = "Neutral", alias = "neutral")]
    Neutral,
    #[serde(alias = "Mixed", alias = "mixed")]
    Mixed,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "POSITIVE",
            Sentiment::Negative => "NEGATIVE",
            Sentiment::Neutral => "NEUTRAL",
            Sentiment::Mixed => "MIXED",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-class sentiment confidence (each 0.0 to 1.0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentScores {
    #[serde(alias = "Positive", alias = "POSITIVE", default)]
    pub positive: f64,
    #[serde(alias = "Negative", alias = "NEGATIVE", default)]
    pub negative: f64,
    #[serde(alias = "Neutral", alias = "NEUTRAL", default)]
    pub neutral: f64,
    #[serde(alias = "Mixed", alias = "MIXED", default)]
    pub mixed: f64,
}

/// Structured output of the text capability plus lexicon matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSignal {
    pub sentiment: Sentiment,
    pub sentiment_scores: SentimentScores,
    /// Unsafe lexicon terms found in the text, in lexicon order.
    pub unsafe_terms: Vec<String>,
}

impl TextSignal {
    pub fn has_unsafe_terms(&self) -> bool {
        !self.unsafe_terms.is_empty()
    }
}

/// Why a single analyzer call failed.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for SignalError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SignalError::Malformed(e.to_string())
        } else {
            SignalError::Transport(e.to_string())
        }
    }
}

/// Image label and moderation capability.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    /// Analyze raw image bytes.
    async fn analyze(&self, image: &[u8]) -> Result<ImageSignal, SignalError>;

    /// Liveness probe. Implementations should answer quickly.
    async fn health(&self) -> bool {
        true
    }
}

/// Text sentiment capability.
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    /// Analyze UTF-8 text.
    async fn analyze(&self, text: &str) -> Result<TextSignal, SignalError>;

    /// Liveness probe. Implementations should answer quickly.
    async fn health(&self) -> bool {
        true
    }
}
