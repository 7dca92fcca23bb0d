// Data models — the records that flow into the result and feedback stores.
//
// These are separate from the store implementations so other modules can
// use them without depending on rusqlite directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::scoring::fusion::RuleHit;
use crate::signals::traits::Sentiment;

/// A fused moderation decision. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDecision {
    /// Join key for later feedback (`prediction_id`).
    pub analysis_id: String,
    /// 0.0 to 1.0
    pub risk_score: f64,
    /// True iff risk_score > 0.6
    pub needs_review: bool,
    pub tier: RiskTier,
    pub explanation: String,
    /// Top 3 image categories
    pub image_categories: Vec<String>,
    pub text_sentiment: Sentiment,
    pub unsafe_terms: Vec<String>,
    pub moderation_flagged: bool,
    /// Context aggregate when a context signal took part in fusion
    pub context_score: Option<f64>,
    pub rules_fired: Vec<RuleHit>,
    pub created_at: DateTime<Utc>,
}

/// Allocate a globally unique analysis id.
pub fn new_analysis_id() -> String {
    format!("mod_{}", uuid::Uuid::new_v4().simple())
}

/// Four fixed explanation tiers keyed by score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    VeryLow,
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Each tier excludes its lower bound, except the bottom one.
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s > 0.7 => RiskTier::High,
            s if s > 0.4 => RiskTier::Medium,
            s if s > 0.1 => RiskTier::Low,
            _ => RiskTier::VeryLow,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::VeryLow => "Very low",
            RiskTier::Low => "Low",
            RiskTier::Medium => "Medium",
            RiskTier::High => "High",
        }
    }

    /// Stable storage/wire key (matches the serde form).
    pub fn key(&self) -> &'static str {
        match self {
            RiskTier::VeryLow => "very_low",
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }

    pub fn explanation(&self) -> &'static str {
        match self {
            RiskTier::High => "High risk: Potential deceptive or harmful content detected",
            RiskTier::Medium => "Medium risk: Content requires careful review",
            RiskTier::Low => "Low risk: Generally safe with minor concerns",
            RiskTier::VeryLow => "Very low risk: Content appears safe and contextually aligned",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reviewer's verdict on a past decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Partial,
    Incorrect,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Correct => "correct",
            Verdict::Partial => "partial",
            Verdict::Incorrect => "incorrect",
        }
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "correct" | "true" | "yes" => Ok(Verdict::Correct),
            "partial" => Ok(Verdict::Partial),
            "incorrect" | "false" | "no" => Ok(Verdict::Incorrect),
            other => Err(format!(
                "unknown verdict `{other}` (expected correct, partial or incorrect)"
            )),
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Clients send either a boolean (`user_feedback: true`) or a label.
impl<'de> Deserialize<'de> for Verdict {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Label(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Ok(Verdict::Correct),
            Raw::Flag(false) => Ok(Verdict::Incorrect),
            Raw::Label(label) => label.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Human feedback on a past decision. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    /// A prior `RiskDecision::analysis_id`. Not checked against the result store.
    pub prediction_id: String,
    pub verdict: Verdict,
    pub corrected_risk_score: Option<f64>,
    #[serde(default)]
    pub corrected_flags: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub submitted_at: DateTime<Utc>,
}

impl FeedbackEvent {
    /// Build an event stamped with the current time.
    pub fn new(prediction_id: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            prediction_id: prediction_id.into(),
            verdict,
            corrected_risk_score: None,
            corrected_flags: Vec::new(),
            metadata: Map::new(),
            submitted_at: Utc::now(),
        }
    }

    /// Blob-store key: `feedback/YYYY/MM/DD/<prediction_id>`.
    pub fn storage_key(&self) -> String {
        format!(
            "feedback/{}/{}",
            self.submitted_at.format("%Y/%m/%d"),
            self.prediction_id
        )
    }
}

/// Aggregate view of stored decisions (for status output).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecisionStats {
    pub total: u64,
    pub needs_review: u64,
}

/// Aggregate view of stored feedback (retraining data collection, status).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedbackSummary {
    pub total: u64,
    pub correct: u64,
    pub partial: u64,
    pub incorrect: u64,
}
