// HTTP adapter for the image analysis service.
//
// The service wraps an image label detector and a moderation-label detector.
// Request: POST {base}/analyze {"image_data": "<base64>"}
// Response: {"categories": [...], "moderation_flagged": bool, "moderation_labels": [...]}
//
// Failures inside the service come back as HTTP 200 with an {"error": "..."}
// body, so a successful status alone doesn't mean a usable signal.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{classify_send_error, probe};
use super::traits::{ImageAnalyzer, ImageSignal, SignalError};

/// Image analysis service client.
pub struct HttpImageAnalyzer {
    client: Client,
    base_url: String,
    timeout: Duration,
    health_timeout: Duration,
}

impl HttpImageAnalyzer {
    /// Create a client for the service at `base_url`.
    ///
    /// `timeout` bounds each analysis call at the transport level;
    /// `health_timeout` bounds liveness probes independently.
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
impl ImageAnalyzer for HttpImageAnalyzer {
    async fn analyze(&self, image: &[u8]) -> Result<ImageSignal, SignalError> {
        let request = ImageRequest {
            image_data: base64::engine::general_purpose::STANDARD.encode(image),
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

        let body: ImageResponse = response.json().await?;
        let signal = body.into_signal()?;

        debug!(
            categories = signal.categories.len(),
            moderation_flagged = signal.moderation_flagged,
            "Image analyzed"
        );

        Ok(signal)
    }

    async fn health(&self) -> bool {
        probe(&self.client, &self.base_url, self.health_timeout).await
    }
}

// --- Image service request/response types ---

#[derive(Serialize)]
struct ImageRequest {
    image_data: String,
}

/// Body returned by the image service. Either the signal fields or `error`.
#[derive(Debug, Deserialize)]
pub struct ImageResponse {
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub moderation_flagged: Option<bool>,
    #[serde(default)]
    pub moderation_labels: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ImageResponse {
    /// Convert into a signal, rejecting error bodies and missing fields.
    pub fn into_signal(self) -> Result<ImageSignal, SignalError> {
        if let Some(error) = self.error {
            return Err(SignalError::Malformed(format!("service reported: {error}")));
        }
        let categories = self
            .categories
            .ok_or_else(|| SignalError::Malformed("missing `categories`".to_string()))?;
        let moderation_flagged = self
            .moderation_flagged
            .ok_or_else(|| SignalError::Malformed("missing `moderation_flagged`".to_string()))?;
        Ok(ImageSignal::new(
            categories,
            moderation_flagged,
            self.moderation_labels,
        ))
    }
}
