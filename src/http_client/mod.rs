//! HTTP client for the prediction endpoint
//!
//! Blocking `reqwest` client with a bounded timeout. A slow or unreachable
//! server surfaces as [`CupError::Timeout`] or [`CupError::Connection`], never
//! as a hang.

use std::time::Duration;

use reqwest::{blocking::Client, header::CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;

use crate::{
    coerce::CanonicalRow,
    error::{CupError, Result},
    json_safe::to_safe_json_string,
    submission::{batch_payload, ClientReply, PredictionTransport},
};

/// Response body of the prediction endpoints
#[derive(Debug, Deserialize)]
struct PredictionBody {
    predictions: Vec<Option<f64>>,
}

/// Client for the named-row prediction endpoint
#[derive(Debug, Clone)]
pub struct PredictionClient {
    client: Client,
    endpoint: String,
    timeout_secs: u64,
}

impl PredictionClient {
    /// Create a client for `endpoint` with a request timeout
    ///
    /// # Errors
    ///
    /// Returns [`CupError::Connection`] if the HTTP client cannot be built.
    pub fn with_timeout(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CupError::Connection(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout_secs,
        })
    }

    /// Endpoint URL
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get the configured timeout
    #[must_use]
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Send sanitized rows and read back one prediction per row
    ///
    /// # Errors
    ///
    /// Returns [`CupError::Timeout`], [`CupError::Connection`] (including
    /// non-2xx answers) or [`CupError::Format`] for an unreadable response.
    pub fn predict_named(&self, rows: &[CanonicalRow]) -> Result<ClientReply> {
        let body = to_safe_json_string(&batch_payload(rows))?;
        self.post_body(&body)
    }

    fn post_body(&self, body: &str) -> Result<ClientReply> {
        debug!(endpoint = %self.endpoint, bytes = body.len(), "posting prediction request");
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        let raw = response.text().map_err(|e| self.transport_error(&e))?;
        if !status.is_success() {
            return Err(CupError::Connection(format!(
                "HTTP {} from {}: {}",
                status, self.endpoint, raw
            )));
        }

        let parsed: PredictionBody = serde_json::from_str(&raw).map_err(|e| CupError::Format {
            reason: format!("Failed to parse prediction response: {e}"),
        })?;
        Ok(ClientReply {
            predictions: parsed.predictions,
            raw,
        })
    }

    fn transport_error(&self, e: &reqwest::Error) -> CupError {
        if e.is_timeout() {
            CupError::Timeout(format!(
                "no answer from {} within {}s",
                self.endpoint, self.timeout_secs
            ))
        } else {
            CupError::Connection(format!("HTTP request failed: {e}"))
        }
    }
}

impl PredictionTransport for PredictionClient {
    fn send(&self, body: &str) -> Result<ClientReply> {
        self.post_body(body)
    }
}
