// HTTP adapter for the text sentiment service.
//
// Request: POST {base}/analyze {"text_content": "..."}
// Response: {"sentiment": "POSITIVE", "sentiment_scores": {"Positive": 0.93, ...}}
//
// The service only classifies sentiment. Unsafe-term matching runs locally
// against the lexicon so the same text always yields the same terms.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{classify_send_error, probe};
use super::lexicon::find_unsafe_terms;
use super::traits::{Sentiment, SentimentScores, SignalError, TextAnalyzer, TextSignal};

/// Text sentiment service client.
pub struct HttpTextAnalyzer {
    client: Client,
    base_url: String,
    timeout: Duration,
    health_timeout: Duration,
}

impl HttpTextAnalyzer {
    /// Create a client for the service at `base_url`.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        health_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("crossmodal/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            health_timeout,
        })
    }
}

#[async_trait]
impl TextAnalyzer for HttpTextAnalyzer {
    async fn analyze(&self, text: &str) -> Result<TextSignal, SignalError> {
        let request = TextRequest {
            text_content: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_send_error(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SignalError::Status { status, body });
        }

        let body: TextResponse = response.json().await?;
        let signal = body.into_signal(text)?;

        debug!(
            sentiment = %signal.sentiment,
            unsafe_terms = ?signal.unsafe_terms,
            "Text analyzed"
        );

        Ok(signal)
    }

    async fn health(&self) -> bool {
        probe(&self.client, &self.base_url, self.health_timeout).await
    }
}

// --- Text service request/response types ---

#[derive(Serialize)]
struct TextRequest {
    text_content: String,
}

/// Body returned by the text service. Either the sentiment fields or `error`.
#[derive(Debug, Deserialize)]
pub struct TextResponse {
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub sentiment_scores: Option<SentimentScores>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TextResponse {
    /// Convert into a signal for `text`, attaching lexicon matches.
    pub fn into_signal(self, text: &str) -> Result<TextSignal, SignalError> {
        if let Some(error) = self.error {
            return Err(SignalError::Malformed(format!("service reported: {error}")));
        }
        let sentiment = self
            .sentiment
            .ok_or_else(|| SignalError::Malformed("missing `sentiment`".to_string()))?;
        let sentiment_scores = self.sentiment_scores.unwrap_or_default();

        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if ![
            sentiment_scores.positive,
            sentiment_scores.negative,
            sentiment_scores.neutral,
            sentiment_scores.mixed,
        ]
        .into_iter()
        .all(in_range)
        {
            return Err(SignalError::Malformed(
                "sentiment score outside 0..=1".to_string(),
            ));
        }

        Ok(TextSignal {
            sentiment,
            sentiment_scores,
            unsafe_terms: find_unsafe_terms(text),
        })
    }
}
