// Context scorer — supplementary risk from request metadata.
//
// Looks only at the context map (platform, time, geography, user history),
// never at the image or text. Pure: no clock, no I/O. The orchestrator fills
// in `hour` / `day_of_week` from the receipt time before calling this.
//
// The aggregate is not clamped here; fusion clamps it once at the point
// of use.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arbitrary request metadata.
pub type ContextMap = Map<String, Value>;

const HIGH_RISK_PLATFORMS: &[&str] = &["anonymous", "darkweb", "tor"];
const MEDIUM_RISK_PLATFORMS: &[&str] = &["social", "forum", "chat"];
const HIGH_RISK_COUNTRIES: &[&str] = &["unknown", "test", "localhost"];

const DEFAULT_REPUTATION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformTier {
    Low,
    Medium,
    High,
}

impl PlatformTier {
    pub fn contribution(&self) -> f64 {
        match self {
            PlatformTier::Low => 0.0,
            PlatformTier::Medium => 0.2,
            PlatformTier::High => 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeographicTier {
    Low,
    High,
}

impl GeographicTier {
    pub fn contribution(&self) -> f64 {
        match self {
            GeographicTier::Low => 0.0,
            GeographicTier::High => 0.2,
        }
    }
}

/// Independent, additive time-based contributions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalRisk {
    pub late_night: f64,
    pub weekend: f64,
    pub peak_hour: f64,
}

impl TemporalRisk {
    pub fn total(&self) -> f64 {
        self.late_night + self.weekend + self.peak_hour
    }
}

/// Context-derived risk signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextSignal {
    pub platform_tier: PlatformTier,
    pub geographic_tier: GeographicTier,
    pub temporal: TemporalRisk,
    /// In [0, 0.7].
    pub user_risk: f64,
}

impl ContextSignal {
    /// Sum of every contribution. Not clamped.
    pub fn aggregate(&self) -> f64 {
        self.platform_tier.contribution()
            + self.temporal.total()
            + self.geographic_tier.contribution()
            + self.user_risk
    }
}

/// Score a context map.
pub fn score(context: &ContextMap) -> ContextSignal {
    let hour = integer(context, "hour");
    let day_of_week = integer(context, "day_of_week");

    ContextSignal {
        platform_tier: platform_tier(text(context, "platform").as_deref()),
        geographic_tier: geographic_tier(text(context, "country").as_deref()),
        temporal: temporal_risk(hour, day_of_week),
        user_risk: user_risk(
            number(context, "user_reputation_score"),
            integer(context, "previous_moderation_flags"),
        ),
    }
}

pub fn platform_tier(platform: Option<&str>) -> PlatformTier {
    let Some(platform) = platform else {
        return PlatformTier::Low;
    };
    let platform = platform.trim().to_lowercase();
    if HIGH_RISK_PLATFORMS.contains(&platform.as_str()) {
        PlatformTier::High
    } else if MEDIUM_RISK_PLATFORMS.contains(&platform.as_str()) {
        PlatformTier::Medium
    } else {
        PlatformTier::Low
    }
}

/// Absent countries count as high risk, same as "unknown".
pub fn geographic_tier(country: Option<&str>) -> GeographicTier {
    match country {
        None => GeographicTier::High,
        Some(c) if HIGH_RISK_COUNTRIES.contains(&c.trim().to_lowercase().as_str()) => {
            GeographicTier::High
        }
        Some(_) => GeographicTier::Low,
    }
}

/// `day_of_week` uses Monday = 0, so 5 and 6 are the weekend.
pub fn temporal_risk(hour: Option<i64>, day_of_week: Option<i64>) -> TemporalRisk {
    let late_night = match hour {
        Some(h) if (0..=4).contains(&h) => 0.3,
        _ => 0.0,
    };
    let peak_hour = match hour {
        Some(h) if (8..=10).contains(&h) || (17..=19).contains(&h) => 0.1,
        _ => 0.0,
    };
    let weekend = match day_of_week {
        Some(d) if d >= 5 => 0.2,
        _ => 0.0,
    };
    TemporalRisk {
        late_night,
        weekend,
        peak_hour,
    }
}

/// `(1 - reputation) * 0.4 + min(flags * 0.1, 0.3)`.
pub fn user_risk(reputation: Option<f64>, prior_flags: Option<i64>) -> f64 {
    let reputation = reputation.unwrap_or(DEFAULT_REPUTATION).clamp(0.0, 1.0);
    let flags = prior_flags.unwrap_or(0).max(0) as f64;
    (1.0 - reputation) * 0.4 + (flags * 0.1).min(0.3)
}

// --- Context map accessors ---
//
// Values may arrive as JSON numbers or numeric strings depending on the client.

fn text(context: &ContextMap, key: &str) -> Option<String> {
    match context.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn number(context: &ContextMap, key: &str) -> Option<f64> {
    match context.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn integer(context: &ContextMap, key: &str) -> Option<i64> {
    match context.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
