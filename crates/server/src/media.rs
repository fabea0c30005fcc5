//! Media engine used for connection-level SDP negotiation
//!
//! The agent never terminates WebRTC itself. An offer received on the
//! WebSocket is handed to an external media engine, whose answer is sent
//! back to the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ServerError;

#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Exchange an SDP offer for an answer
    async fn negotiate(&self, session_id: &str, offer_sdp: &str) -> Result<String, ServerError>;
}

#[derive(Serialize)]
struct OfferRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    sdp: &'a str,
    session_id: &'a str,
}

#[derive(Deserialize)]
struct AnswerResponse {
    sdp: String,
}

/// Posts offers to `{engine_url}/offer`
pub struct HttpMediaEngine {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMediaEngine {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MediaEngine for HttpMediaEngine {
    async fn negotiate(&self, session_id: &str, offer_sdp: &str) -> Result<String, ServerError> {
        let response = self
            .client
            .post(format!("{}/offer", self.base_url))
            .json(&OfferRequest {
                kind: "offer",
                sdp: offer_sdp,
                session_id,
            })
            .send()
            .await
            .map_err(|e| ServerError::Media(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServerError::Media(format!("engine returned {}: {}", status, body.trim())));
        }

        let answer: AnswerResponse = response
            .json()
            .await
            .map_err(|e| ServerError::Media(format!("invalid answer: {}", e)))?;

        tracing::debug!(session_id, answer_bytes = answer.sdp.len(), "SDP negotiated");
        Ok(answer.sdp)
    }
}
