// Shared HTTP plumbing for the analysis service adapters.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::traits::SignalError;

/// Map a reqwest send error, keeping timeouts distinct from transport faults.
pub fn classify_send_error(e: reqwest::Error, timeout: Duration) -> SignalError {
    if e.is_timeout() {
        SignalError::Timeout(timeout)
    } else {
        SignalError::from(e)
    }
}

/// GET {base}/health with its own short timeout.
pub async fn probe(client: &Client, base_url: &str, timeout: Duration) -> bool {
    match client
        .get(format!("{base_url}/health"))
        .timeout(timeout)
        .send()
        .await
    {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            debug!(url = base_url, error = %e, "Health probe failed");
            false
        }
    }
}
