//! HttpQuotaGate -- [`QuotaGate`] backed by a running `parley serve`.
//!
//! The server identifies the caller by its network address, so the
//! `client_id` argument is only used for logging here. There is no refund
//! endpoint; a refund is logged and otherwise ignored, so a turn that fails
//! after a remote consume still costs one unit.

use std::time::Duration;

use reqwest::StatusCode;

use parley_core::quota::gate::QuotaGate;
use parley_types::error::QuotaError;
use parley_types::quota::{QuotaExceededBody, UsageSnapshot};

/// Remote quota gate speaking the `/api/check-usage` protocol.
pub struct HttpQuotaGate {
    client: reqwest::Client,
    base_url: String,
}

impl HttpQuotaGate {
    const TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a gate for the server at `base_url` (e.g. `http://127.0.0.1:3000`).
    pub fn new(base_url: &str) -> Result<Self, QuotaError> {
        let client = reqwest::Client::builder()
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(|e| QuotaError::Unavailable(format!("failed to create http client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read_usage(response: reqwest::Response) -> Result<UsageSnapshot, QuotaError> {
        let status = response.status();
        match status {
            StatusCode::OK => response
                .json::<UsageSnapshot>()
                .await
                .map_err(|e| QuotaError::Unavailable(format!("invalid usage body: {e}"))),
            StatusCode::TOO_MANY_REQUESTS => {
                let body = response
                    .json::<QuotaExceededBody>()
                    .await
                    .map_err(|e| QuotaError::Unavailable(format!("invalid 429 body: {e}")))?;
                Err(QuotaError::Exceeded {
                    retry_after_hours: body.remaining_time,
                })
            }
            other => {
                let text = response.text().await.unwrap_or_default();
                Err(QuotaError::Unavailable(format!("quota server returned {other}: {text}")))
            }
        }
    }
}

impl QuotaGate for HttpQuotaGate {
    async fn try_consume(&self, client_id: &str) -> Result<UsageSnapshot, QuotaError> {
        let url = format!("{}/api/check-usage", self.base_url);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| QuotaError::Unavailable(format!("{url}: {e}")))?;

        let outcome = Self::read_usage(response).await;
        match &outcome {
            Ok(usage) => tracing::debug!(client_id, remaining = usage.remaining_count, "Remote quota consumed"),
            Err(e) => tracing::info!(client_id, error = %e, "Remote quota refused"),
        }
        outcome
    }

    async fn peek(&self, _client_id: &str) -> Result<UsageSnapshot, QuotaError> {
        let url = format!("{}/api/usage-info", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| QuotaError::Unavailable(format!("{url}: {e}")))?;
        Self::read_usage(response).await
    }

    async fn refund(&self, client_id: &str) -> Result<(), QuotaError> {
        tracing::warn!(client_id, server = %self.base_url, "Remote quota has no refund; unit stays consumed");
        Ok(())
    }
}
