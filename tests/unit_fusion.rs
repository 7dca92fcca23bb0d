// Unit tests for the risk fusion engine.
//
// Tests the pure fusion function end to end: the worked scenarios, score
// bounds across every combination of signals, the review threshold, tier
// boundaries and determinism.

use crossmodal::db::models::RiskTier;
use crossmodal::scoring::context::{ContextSignal, GeographicTier, PlatformTier, TemporalRisk};
use crossmodal::scoring::fusion::{fuse, Rule, REVIEW_THRESHOLD};
use crossmodal::signals::traits::{ImageSignal, Sentiment, SentimentScores, TextSignal};

fn image(categories: &[&str], flagged: bool) -> ImageSignal {
    ImageSignal::new(
        categories.iter().map(|c| c.to_string()).collect(),
        flagged,
        vec![],
    )
}

fn text(sentiment: Sentiment, terms: &[&str]) -> TextSignal {
    TextSignal {
        sentiment,
        sentiment_scores: SentimentScores::default(),
        unsafe_terms: terms.iter().map(|t| t.to_string()).collect(),
    }
}

fn context(platform: PlatformTier, user_risk: f64) -> ContextSignal {
    ContextSignal {
        platform_tier: platform,
        geographic_tier: GeographicTier::High,
        temporal: TemporalRisk {
            late_night: 0.3,
            weekend: 0.2,
            peak_hour: 0.0,
        },
        user_risk,
    }
}

fn rules(fusion: &crossmodal::scoring::fusion::Fusion) -> Vec<Rule> {
    fusion.rules_fired.iter().map(|h| h.rule).collect()
}

// ============================================================
// Worked scenarios
// ============================================================

#[test]
fn family_photo_with_weapon_talk_is_high_risk() {
    let result = fuse(
        &image(&["Family", "Person"], false),
        &text(Sentiment::Neutral, &["weapon"]),
        None,
    );
    assert_eq!(result.risk_score, 0.9);
    assert!(result.needs_review);
    assert_eq!(result.tier, RiskTier::High);
    assert_eq!(
        result.explanation(),
        "High risk: Potential deceptive or harmful content detected"
    );
    // Mismatch and unsafe-term rules stack on the same evidence
    assert_eq!(
        rules(&result),
        vec![Rule::ContextualMismatchSafeImageUnsafeText, Rule::UnsafeTerms]
    );
}

#[test]
fn weapon_image_with_upbeat_text_is_medium_risk() {
    let result = fuse(&image(&["Weapon"], false), &text(Sentiment::Positive, &[]), None);
    assert_eq!(result.risk_score, 0.5);
    assert!(!result.needs_review);
    assert_eq!(result.tier, RiskTier::Medium);
    assert_eq!(
        result.explanation(),
        "Medium risk: Content requires careful review"
    );
}

#[test]
fn aligned_family_post_is_very_low_risk() {
    let result = fuse(&image(&["Family"], false), &text(Sentiment::Positive, &[]), None);
    assert_eq!(result.risk_score, 0.0);
    assert!(!result.needs_review);
    assert_eq!(result.tier, RiskTier::VeryLow);
    assert_eq!(
        result.explanation(),
        "Very low risk: Content appears safe and contextually aligned"
    );
}

#[test]
fn neutral_content_scores_zero_without_firing_rules() {
    let result = fuse(&image(&["Building", "Sky"], false), &text(Sentiment::Neutral, &[]), None);
    assert_eq!(result.risk_score, 0.0);
    assert!(result.rules_fired.is_empty());
}

#[test]
fn negative_text_alone_is_low_risk() {
    let result = fuse(&image(&["Car"], false), &text(Sentiment::Negative, &[]), None);
    assert_eq!(result.risk_score, 0.2);
    assert_eq!(result.tier, RiskTier::Low);
}

// ============================================================
// Bounds and the review flag across every signal combination
// ============================================================

#[test]
fn score_is_bounded_and_review_flag_tracks_threshold() {
    let category_sets: [&[&str]; 5] = [
        &[],
        &["Family"],
        &["Weapon"],
        &["Family", "Weapon"],
        &["Tree", "Sky"],
    ];
    let sentiments = [
        Sentiment::Positive,
        Sentiment::Negative,
        Sentiment::Neutral,
        Sentiment::Mixed,
    ];
    let term_sets: [&[&str]; 3] = [&[], &["kill"], &["kill", "bomb", "gun"]];
    let contexts = [
        None,
        Some(context(PlatformTier::Low, 0.0)),
        Some(context(PlatformTier::High, 0.7)),
    ];

    for categories in category_sets {
        for flagged in [false, true] {
            for sentiment in sentiments {
                for terms in term_sets {
                    for ctx in &contexts {
                        let result = fuse(
                            &image(categories, flagged),
                            &text(sentiment, terms),
                            ctx.as_ref(),
                        );
                        assert!(
                            (0.0..=1.0).contains(&result.risk_score),
                            "score {} out of range for {categories:?}/{flagged}/{sentiment}/{terms:?}",
                            result.risk_score
                        );
                        assert_eq!(result.needs_review, result.risk_score > REVIEW_THRESHOLD);
                        assert_eq!(result.tier, RiskTier::from_score(result.risk_score));
                    }
                }
            }
        }
    }
}

#[test]
fn everything_firing_clamps_to_one() {
    let result = fuse(
        &image(&["Family", "Weapon"], true),
        &text(Sentiment::Negative, &["bomb"]),
        Some(&context(PlatformTier::High, 0.7)),
    );
    assert_eq!(result.risk_score, 1.0);
    assert!(result.needs_review);
}

#[test]
fn oversized_context_contributes_at_most_one() {
    // Aggregate here is 0.4 + 0.2 + 0.5 + 0.7 = 1.8
    let ctx = context(PlatformTier::High, 0.7);
    assert!(ctx.aggregate() > 1.0);

    let result = fuse(&image(&[], false), &text(Sentiment::Neutral, &[]), Some(&ctx));
    let hit = result
        .rules_fired
        .iter()
        .find(|h| h.rule == Rule::Context)
        .unwrap();
    assert_eq!(hit.contribution, 1.0);
    assert_eq!(result.risk_score, 1.0);
}

#[test]
fn alignment_bonus_is_applied_before_context() {
    // Floor happens first, so context is added to 0.0 rather than -0.3
    let ctx = ContextSignal {
        platform_tier: PlatformTier::Medium,
        geographic_tier: GeographicTier::Low,
        temporal: TemporalRisk::default(),
        user_risk: 0.0,
    };
    let result = fuse(&image(&["Baby"], false), &text(Sentiment::Positive, &[]), Some(&ctx));
    assert_eq!(result.risk_score, 0.2);
}

// ============================================================
// Tier boundaries and review threshold
// ============================================================

#[test]
fn tier_boundaries() {
    assert_eq!(RiskTier::from_score(0.71), RiskTier::High);
    assert_eq!(RiskTier::from_score(0.70), RiskTier::Medium);
    assert_eq!(RiskTier::from_score(0.41), RiskTier::Medium);
    assert_eq!(RiskTier::from_score(0.40), RiskTier::Low);
    assert_eq!(RiskTier::from_score(0.11), RiskTier::Low);
    assert_eq!(RiskTier::from_score(0.10), RiskTier::VeryLow);
    assert_eq!(RiskTier::from_score(0.0), RiskTier::VeryLow);
    assert_eq!(RiskTier::from_score(1.0), RiskTier::High);
}

#[test]
fn review_threshold_is_exclusive() {
    // Unsafe terms + flagged image = 0.3 + 0.4
    let result = fuse(&image(&["Car"], true), &text(Sentiment::Neutral, &["gun"]), None);
    assert_eq!(result.risk_score, 0.7);
    assert!(result.needs_review);
    assert_eq!(result.tier, RiskTier::Medium);

    // Flag + negative = 0.6, not above the threshold
    let result = fuse(&image(&["Car"], true), &text(Sentiment::Negative, &[]), None);
    assert_eq!(result.risk_score, 0.6);
    assert!(!result.needs_review);
}

#[test]
fn float_noise_does_not_cross_tier_boundary() {
    // 0.4 + 0.2 + 0.1 sums to 0.7000000000000001 in binary floating point
    let ctx = ContextSignal {
        platform_tier: PlatformTier::Low,
        geographic_tier: GeographicTier::Low,
        temporal: TemporalRisk {
            late_night: 0.0,
            weekend: 0.0,
            peak_hour: 0.1,
        },
        user_risk: 0.0,
    };
    let result = fuse(&image(&["Car"], true), &text(Sentiment::Negative, &[]), Some(&ctx));
    assert_eq!(result.risk_score, 0.7);
    assert_eq!(result.tier, RiskTier::Medium);
}

// ============================================================
// Determinism
// ============================================================

#[test]
fn fusion_is_idempotent() {
    let img = image(&["Family", "Weapon"], true);
    let txt = text(Sentiment::Mixed, &["drugs"]);
    let ctx = context(PlatformTier::Medium, 0.25);

    let first = fuse(&img, &txt, Some(&ctx));
    for _ in 0..10 {
        assert_eq!(fuse(&img, &txt, Some(&ctx)), first);
    }
}
