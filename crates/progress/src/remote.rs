//! Remote recompute procedures.
//!
//! The shared backend may expose its own progress procedures that encode rules
//! beyond the local formula. The orchestrator treats them as the primary path
//! and always bounds them with a deadline.

use std::time::Duration;
use async_trait::async_trait;
use bookwork_core::{BookingId, MilestoneId};
use reqwest::{Client, ClientBuilder};
use serde_json::{json, Value};
use tracing::debug;

/// Why the primary path did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum RecomputeError {
    /// Deadline expired; the call was cancelled
    #[error("remote recompute timed out after {0:?}")]
    Timeout(Duration),

    /// Procedure missing or backend refused
    #[error("remote recompute unavailable: {0}")]
    Unavailable(String),

    /// Transport failure
    #[error("remote recompute request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Body was not a percentage in 0..=100
    #[error("remote recompute returned an invalid value: {0}")]
    InvalidResponse(String),
}

/// Remote recompute procedures for the two aggregate levels.
#[async_trait]
pub trait RemoteRecompute: Send + Sync {
    /// Recompute and return a milestone's progress.
    async fn recompute_milestone(&self, id: MilestoneId) -> Result<u8, RecomputeError>;

    /// Recompute and return a booking's progress.
    async fn recompute_booking(&self, id: BookingId) -> Result<u8, RecomputeError>;
}

/// Remote procedures exposed as HTTP RPC endpoints.
///
/// Calls `POST {base_url}/rpc/calculate_milestone_progress` and
/// `POST {base_url}/rpc/calculate_booking_progress`.
#[derive(Clone)]
pub struct HttpRecompute {
    /// HTTP client
    client: Client,

    /// Base URL of the RPC API
    base_url: String,

    /// API key sent as `apikey` and bearer token
    api_key: Option<String>,
}

impl HttpRecompute {
    /// Create a client for `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: ClientBuilder::new()
                .connect_timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Authenticate with `api_key`.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    async fn call(&self, procedure: &str, body: Value) -> Result<u8, RecomputeError> {
        let url = format!("{}/rpc/{}", self.base_url, procedure);
        debug!("Calling {}", url);

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RecomputeError::Unavailable(format!("{} returned {}: {}", procedure, status, text)));
        }

        let value: Value = response.json().await?;
        parse_percentage(&value)
    }
}

#[async_trait]
impl RemoteRecompute for HttpRecompute {
    async fn recompute_milestone(&self, id: MilestoneId) -> Result<u8, RecomputeError> {
        self.call("calculate_milestone_progress", json!({ "milestone_id": id }))
            .await
    }

    async fn recompute_booking(&self, id: BookingId) -> Result<u8, RecomputeError> {
        self.call("calculate_booking_progress", json!({ "booking_id": id }))
            .await
    }
}

/// Accepts a bare number or an object with `progress_percentage`.
fn parse_percentage(value: &Value) -> Result<u8, RecomputeError> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => map.get("progress_percentage").and_then(Value::as_f64),
        _ => None,
    }
    .ok_or_else(|| RecomputeError::InvalidResponse(value.to_string()))?;

    if !number.is_finite() || !(0.0..=100.0).contains(&number) {
        return Err(RecomputeError::InvalidResponse(value.to_string()));
    }
    Ok(number.round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_number() {
        assert_eq!(parse_percentage(&json!(83)).unwrap(), 83);
        assert_eq!(parse_percentage(&json!(49.6)).unwrap(), 50);
    }

    #[test]
    fn test_parse_object() {
        assert_eq!(parse_percentage(&json!({ "progress_percentage": 12 })).unwrap(), 12);
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(matches!(parse_percentage(&json!(101)), Err(RecomputeError::InvalidResponse(_))));
        assert!(matches!(parse_percentage(&json!(-1)), Err(RecomputeError::InvalidResponse(_))));
        assert!(matches!(parse_percentage(&json!("50")), Err(RecomputeError::InvalidResponse(_))));
        assert!(matches!(parse_percentage(&json!(null)), Err(RecomputeError::InvalidResponse(_))));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let remote = HttpRecompute::new("http://localhost:54321/rest/v1/");
        assert_eq!(remote.base_url, "http://localhost:54321/rest/v1");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_an_error() {
        // Port 9 (discard) on loopback is not expected to speak HTTP.
        let remote = HttpRecompute::new("http://127.0.0.1:9");
        assert!(remote.recompute_booking(BookingId::new()).await.is_err());
    }
}
