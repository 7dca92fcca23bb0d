// Risk fusion — combines image, text and context signals into one score.
//
// Additive scoring: each rule adds (or, for the alignment bonus, subtracts)
// a fixed weight. The key idea is contextual mismatch: a benign-looking
// image paired with unsafe text, or a violent image paired with upbeat text,
// is weighted more heavily than either signal on its own.
//
// Everything here is a pure function of its inputs.

use serde::{Deserialize, Serialize};

use crate::db::models::RiskTier;
use crate::scoring::context::ContextSignal;
use crate::signals::traits::{ImageSignal, Sentiment, TextSignal};

/// Scores strictly above this need human review. Not configurable.
pub const REVIEW_THRESHOLD: f64 = 0.6;

/// Image categories that suggest benign content (matched case-insensitively).
pub const SAFE_IMAGE_CATEGORIES: &[&str] = &[
    "family", "child", "person", "people", "nature", "animal", "face", "portrait", "kid", "baby",
];

/// Image categories that suggest harmful content (matched case-insensitively).
pub const UNSAFE_IMAGE_CATEGORIES: &[&str] = &[
    "weapon", "violence", "fire", "riot", "protest", "drugs", "alcohol",
];

/// Rule weights for the fusion formula.
///
/// `score = clamp(Σ fired rule weights [+ clamp(context, 0, 1)], 0, 1)`
/// with the alignment bonus flooring the running total at zero.
#[derive(Debug, Clone)]
pub struct FusionWeights {
    /// Safe-leaning image with unsafe terms in the text (default 0.6)
    pub safe_image_unsafe_text: f64,
    /// Unsafe-leaning image with positive text (default 0.5)
    pub unsafe_image_positive_text: f64,
    /// Any unsafe term, independent of the image (default 0.3).
    /// Stacks with `safe_image_unsafe_text`.
    pub unsafe_terms: f64,
    /// Image moderation flag raised (default 0.4)
    pub moderation_flagged: f64,
    /// Negative text sentiment (default 0.2)
    pub negative_sentiment: f64,
    /// Subtracted when a safe image meets clean positive text (default 0.3)
    pub alignment_bonus: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            safe_image_unsafe_text: 0.6,
            unsafe_image_positive_text: 0.5,
            unsafe_terms: 0.3,
            moderation_flagged: 0.4,
            negative_sentiment: 0.2,
            alignment_bonus: 0.3,
        }
    }
}

/// Named fusion rules, recorded in the audit trail of every decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    ContextualMismatchSafeImageUnsafeText,
    ContextualMismatchUnsafeImagePositiveText,
    UnsafeTerms,
    ImageModerationFlagged,
    NegativeSentiment,
    ContextualAlignment,
    Context,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::ContextualMismatchSafeImageUnsafeText => {
                "contextual_mismatch_safe_image_unsafe_text"
            }
            Rule::ContextualMismatchUnsafeImagePositiveText => {
                "contextual_mismatch_unsafe_image_positive_text"
            }
            Rule::UnsafeTerms => "unsafe_terms",
            Rule::ImageModerationFlagged => "image_moderation_flagged",
            Rule::NegativeSentiment => "negative_sentiment",
            Rule::ContextualAlignment => "contextual_alignment",
            Rule::Context => "context",
        }
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One rule that fired and what it contributed (negative for the bonus).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleHit {
    pub rule: Rule,
    pub contribution: f64,
}

/// Output of the fusion engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fusion {
    /// 0.0 to 1.0
    pub risk_score: f64,
    pub needs_review: bool,
    pub tier: RiskTier,
    pub rules_fired: Vec<RuleHit>,
}

impl Fusion {
    pub fn explanation(&self) -> &'static str {
        self.tier.explanation()
    }
}

/// Which way the image leans. Both can be false (a neutral image).
pub fn image_leaning(categories: &[String]) -> (bool, bool) {
    let matches = |set: &[&str]| {
        categories
            .iter()
            .any(|c| set.iter().any(|s| c.eq_ignore_ascii_case(s)))
    };
    (
        matches(SAFE_IMAGE_CATEGORIES),
        matches(UNSAFE_IMAGE_CATEGORIES),
    )
}

/// Fuse signals with the default weights.
pub fn fuse(image: &ImageSignal, text: &TextSignal, context: Option<&ContextSignal>) -> Fusion {
    fuse_with_weights(image, text, context, &FusionWeights::default())
}

/// Fuse signals into a bounded risk score, review flag and tier.
pub fn fuse_with_weights(
    image: &ImageSignal,
    text: &TextSignal,
    context: Option<&ContextSignal>,
    weights: &FusionWeights,
) -> Fusion {
    let (image_safe, image_unsafe) = image_leaning(&image.categories);
    let has_unsafe_terms = text.has_unsafe_terms();
    let positive = text.sentiment == Sentiment::Positive;

    let mut risk = 0.0;
    let mut rules_fired = Vec::new();
    let mut fire = |risk: &mut f64, rule: Rule, contribution: f64| {
        *risk += contribution;
        rules_fired.push(RuleHit { rule, contribution });
    };

    if image_safe && has_unsafe_terms {
        fire(
            &mut risk,
            Rule::ContextualMismatchSafeImageUnsafeText,
            weights.safe_image_unsafe_text,
        );
    }

    if image_unsafe && positive {
        fire(
            &mut risk,
            Rule::ContextualMismatchUnsafeImagePositiveText,
            weights.unsafe_image_positive_text,
        );
    }

    if has_unsafe_terms {
        fire(&mut risk, Rule::UnsafeTerms, weights.unsafe_terms);
    }

    if image.moderation_flagged {
        fire(
            &mut risk,
            Rule::ImageModerationFlagged,
            weights.moderation_flagged,
        );
    }

    if text.sentiment == Sentiment::Negative {
        fire(&mut risk, Rule::NegativeSentiment, weights.negative_sentiment);
    }

    if image_safe && positive && !has_unsafe_terms {
        fire(&mut risk, Rule::ContextualAlignment, -weights.alignment_bonus);
        // Local floor: the bonus can cancel risk but never go below zero
        risk = f64::max(risk, 0.0);
    }

    if let Some(context) = context {
        fire(
            &mut risk,
            Rule::Context,
            context.aggregate().clamp(0.0, 1.0),
        );
    }

    let risk_score = round_score(risk.clamp(0.0, 1.0));
    let tier = RiskTier::from_score(risk_score);

    Fusion {
        risk_score,
        needs_review: risk_score > REVIEW_THRESHOLD,
        tier,
        rules_fired,
    }
}

/// Round to 6 decimal places so float noise can't move a tier boundary.
fn round_score(score: f64) -> f64 {
    (score * 1_000_000.0).round() / 1_000_000.0
}
