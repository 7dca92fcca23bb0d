// Moderation pipeline: validate -> fan out to analyzers -> fuse -> persist.
//
// One call to `Orchestrator::handle` per inbound request:
// 1. The request is validated before any analyzer is contacted
// 2. Image and text analysis run concurrently, each under its own timeout
// 3. If either fails the whole request fails (no partial fusion)
// 4. Context (when supplied) is scored and the three signals are fused
// 5. The decision is written once to the result store; a write failure is
//    reported through `persisted = false` but the decision is still returned

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::db::models::{new_analysis_id, RiskDecision};
use crate::db::ResultStore;
use crate::error::{Dependency, ModerationError};
use crate::metrics::{Component, Metrics};
use crate::scoring::context::{self, ContextMap, ContextSignal};
use crate::scoring::fusion::{self, FusionWeights};
use crate::signals::traits::{ImageAnalyzer, ImageSignal, SignalError, TextAnalyzer, TextSignal};

/// How many image categories a decision keeps.
const TOP_CATEGORIES: usize = 3;

/// Standard alphabet, padding optional. Browsers and CLI tools disagree on it.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A validated moderation request.
#[derive(Debug, Clone)]
pub struct ModerationRequest {
    pub image: Vec<u8>,
    pub text: String,
    pub context: ContextMap,
}

impl ModerationRequest {
    /// Validate raw inputs: the image must be non-empty and sniff as an
    /// image format, the text must contain something besides whitespace.
    pub fn new(
        image: Vec<u8>,
        text: impl Into<String>,
        context: ContextMap,
    ) -> Result<Self, ModerationError> {
        if image.is_empty() {
            return Err(ModerationError::InvalidInput("image is empty".to_string()));
        }
        if !infer::is_image(&image) {
            return Err(ModerationError::InvalidInput(
                "image data is not a recognised image format".to_string(),
            ));
        }

        let text = text.into();
        if text.trim().is_empty() {
            return Err(ModerationError::InvalidInput("text is empty".to_string()));
        }

        Ok(Self {
            image,
            text,
            context,
        })
    }

    /// Build a request from a base64 image payload, as sent over HTTP.
    pub fn from_base64(
        image_b64: &str,
        text: impl Into<String>,
        context: ContextMap,
    ) -> Result<Self, ModerationError> {
        let image = decode_image(image_b64)?;
        Self::new(image, text, context)
    }
}

/// Decode a base64 image payload. Accepts an optional `data:...;base64,`
/// prefix, embedded whitespace and missing padding.
pub fn decode_image(image_b64: &str) -> Result<Vec<u8>, ModerationError> {
    let payload = match image_b64.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => image_b64,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(ModerationError::InvalidInput("image is empty".to_string()));
    }

    LENIENT_BASE64
        .decode(compact.as_bytes())
        .map_err(|e| ModerationError::InvalidInput(format!("image is not valid base64: {e}")))
}

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Deadline for each analyzer call, applied independently.
    pub signal_timeout: Duration,
    pub weights: FusionWeights,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            signal_timeout: Duration::from_secs(10),
            weights: FusionWeights::default(),
        }
    }
}

/// What a caller gets back from a successful request.
#[derive(Debug, Clone)]
pub struct ModerationOutcome {
    pub decision: RiskDecision,
    /// False when the result store write failed.
    pub persisted: bool,
    pub processing_time_ms: u64,
}

pub struct Orchestrator {
    image: Arc<dyn ImageAnalyzer>,
    text: Arc<dyn TextAnalyzer>,
    results: Arc<dyn ResultStore>,
    metrics: Arc<Metrics>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        image: Arc<dyn ImageAnalyzer>,
        text: Arc<dyn TextAnalyzer>,
        results: Arc<dyn ResultStore>,
        metrics: Arc<Metrics>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            image,
            text,
            results,
            metrics,
            settings,
        }
    }

    pub fn image_analyzer(&self) -> &Arc<dyn ImageAnalyzer> {
        &self.image
    }

    pub fn text_analyzer(&self) -> &Arc<dyn TextAnalyzer> {
        &self.text
    }

    pub fn result_store(&self) -> &Arc<dyn ResultStore> {
        &self.results
    }

    /// Run one moderation request end to end.
    pub async fn handle(
        &self,
        request: ModerationRequest,
    ) -> Result<ModerationOutcome, ModerationError> {
        let started = Instant::now();
        let result = self.run(request, Utc::now(), started).await;
        self.metrics
            .record(Component::Orchestrator, started.elapsed(), result.is_ok());
        result
    }

    async fn run(
        &self,
        request: ModerationRequest,
        received_at: DateTime<Utc>,
        started: Instant,
    ) -> Result<ModerationOutcome, ModerationError> {
        // Fan out. try_join! drops the other call as soon as one fails.
        let (image, text) = tokio::try_join!(
            self.analyze_image(&request.image),
            self.analyze_text(&request.text),
        )?;

        let context_signal = self.score_context(request.context, received_at);

        let fusion_started = Instant::now();
        let fused = fusion::fuse_with_weights(
            &image,
            &text,
            context_signal.as_ref(),
            &self.settings.weights,
        );
        self.metrics
            .record(Component::Fusion, fusion_started.elapsed(), true);

        let decision = RiskDecision {
            analysis_id: new_analysis_id(),
            risk_score: fused.risk_score,
            needs_review: fused.needs_review,
            tier: fused.tier,
            explanation: fused.explanation().to_string(),
            image_categories: image.top_categories(TOP_CATEGORIES),
            text_sentiment: text.sentiment,
            unsafe_terms: text.unsafe_terms,
            moderation_flagged: image.moderation_flagged,
            context_score: context_signal.as_ref().map(ContextSignal::aggregate),
            rules_fired: fused.rules_fired,
            created_at: received_at,
        };

        let persisted = match self.results.put_decision(&decision).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    analysis_id = %decision.analysis_id,
                    error = %e,
                    "Failed to persist decision, returning it anyway"
                );
                self.metrics.record_persistence_failure();
                false
            }
        };

        info!(
            analysis_id = %decision.analysis_id,
            risk_score = decision.risk_score,
            needs_review = decision.needs_review,
            persisted,
            "Moderation decision"
        );

        Ok(ModerationOutcome {
            decision,
            persisted,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn analyze_image(&self, bytes: &[u8]) -> Result<ImageSignal, ModerationError> {
        let started = Instant::now();
        let timeout = self.settings.signal_timeout;
        let result = tokio::time::timeout(timeout, self.image.analyze(bytes))
            .await
            .unwrap_or(Err(SignalError::Timeout(timeout)));
        self.metrics
            .record(Component::ImageAnalysis, started.elapsed(), result.is_ok());

        result.map_err(|e| {
            warn!(dependency = "image analysis", error = %e, "Signal call failed");
            ModerationError::dependency(Dependency::ImageAnalysis, &e)
        })
    }

    async fn analyze_text(&self, text: &str) -> Result<TextSignal, ModerationError> {
        let started = Instant::now();
        let timeout = self.settings.signal_timeout;
        let result = tokio::time::timeout(timeout, self.text.analyze(text))
            .await
            .unwrap_or(Err(SignalError::Timeout(timeout)));
        self.metrics
            .record(Component::TextAnalysis, started.elapsed(), result.is_ok());

        result.map_err(|e| {
            warn!(dependency = "text analysis", error = %e, "Signal call failed");
            ModerationError::dependency(Dependency::TextAnalysis, &e)
        })
    }

    /// Score the caller's context. An empty map means no context signal.
    fn score_context(
        &self,
        mut context: ContextMap,
        received_at: DateTime<Utc>,
    ) -> Option<ContextSignal> {
        if context.is_empty() {
            return None;
        }

        stamp_receipt_time(&mut context, received_at);

        let started = Instant::now();
        let signal = context::score(&context);
        self.metrics
            .record(Component::Context, started.elapsed(), true);
        debug!(aggregate = signal.aggregate(), "Context scored");
        Some(signal)
    }
}

/// Fill in `hour` and `day_of_week` (0 = Monday) from the receipt time
/// when the caller left them out.
pub fn stamp_receipt_time(context: &mut ContextMap, received_at: DateTime<Utc>) {
    context
        .entry("hour")
        .or_insert_with(|| Value::from(received_at.hour()));
    context
        .entry("day_of_week")
        .or_insert_with(|| Value::from(received_at.weekday().num_days_from_monday()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn test_decode_accepts_data_url_and_missing_padding() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(PNG_MAGIC);
        let unpadded = encoded.trim_end_matches('=');
        let with_prefix = format!("data:image/png;base64,{unpadded}");
        assert_eq!(decode_image(&with_prefix).unwrap(), PNG_MAGIC);

        let wrapped = format!("{}\n{}", &encoded[..8], &encoded[8..]);
        assert_eq!(decode_image(&wrapped).unwrap(), PNG_MAGIC);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_image("not base64 at all!"),
            Err(ModerationError::InvalidInput(_))
        ));
        assert!(matches!(
            decode_image("   "),
            Err(ModerationError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_request_validation() {
        assert!(ModerationRequest::new(PNG_MAGIC.to_vec(), "hello", ContextMap::new()).is_ok());
        assert!(ModerationRequest::new(Vec::new(), "hello", ContextMap::new()).is_err());
        assert!(ModerationRequest::new(b"plain text".to_vec(), "hello", ContextMap::new()).is_err());
        assert!(ModerationRequest::new(PNG_MAGIC.to_vec(), "  \n", ContextMap::new()).is_err());
    }

    #[test]
    fn test_stamp_fills_only_missing_fields() {
        // 2024-03-09 is a Saturday
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 2, 30, 0).unwrap();

        let mut ctx = ContextMap::new();
        ctx.insert("platform".into(), Value::from("social"));
        stamp_receipt_time(&mut ctx, at);
        assert_eq!(ctx["hour"], Value::from(2));
        assert_eq!(ctx["day_of_week"], Value::from(5));

        let mut ctx = ContextMap::new();
        ctx.insert("hour".into(), Value::from(14));
        stamp_receipt_time(&mut ctx, at);
        assert_eq!(ctx["hour"], Value::from(14));
        assert_eq!(ctx["day_of_week"], Value::from(5));
    }
}
