//! Self-hosted model server (`POST /stt`)
//!
//! Multipart upload with the audio under field `file`; the server answers
//! `{"text"}` or a non-2xx `{"error"}`.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;

use voice_agent_config::SelfHostedConfig;
use voice_agent_core::{AudioFrameStream, Result, SpeechRecognizer, TranscriptStream};

use super::{buffered_recognition, UtteranceConfig};
use crate::backend::{build_client, status_error, transport_error, Stage};
use crate::PipelineError;

#[derive(Debug, Clone)]
pub struct SelfHostedSttConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub filename: String,
    pub content_type: String,
    pub timeout: Duration,
}

impl From<&SelfHostedConfig> for SelfHostedSttConfig {
    fn from(config: &SelfHostedConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            filename: config.stt_filename.clone(),
            content_type: config.stt_content_type.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

#[derive(Deserialize)]
struct SttResponse {
    #[serde(default)]
    text: String,
}

pub struct SelfHostedRecognizer {
    client: reqwest::Client,
    config: SelfHostedSttConfig,
    utterance: UtteranceConfig,
}

impl SelfHostedRecognizer {
    pub fn new(
        config: SelfHostedSttConfig,
        utterance: UtteranceConfig,
    ) -> std::result::Result<Self, PipelineError> {
        // Reject an unusable content type at startup rather than per request
        Part::bytes(Vec::new())
            .mime_str(&config.content_type)
            .map_err(|e| PipelineError::Configuration(format!("self_hosted.stt_content_type: {}", e)))?;

        Ok(Self {
            client: build_client(config.timeout)?,
            config,
            utterance,
        })
    }

    async fn post_audio(&self, audio: Vec<u8>) -> std::result::Result<String, PipelineError> {
        let part = Part::bytes(audio)
            .file_name(self.config.filename.clone())
            .mime_str(&self.config.content_type)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        let mut request = self
            .client
            .post(format!("{}/stt", self.config.base_url))
            .multipart(Form::new().part("file", part));
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(Stage::Recognition, self.config.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(Stage::Recognition, status, &body));
        }

        let parsed: SttResponse = response.json().await.map_err(|e| {
            PipelineError::Recognition(format!("Failed to parse /stt response: {}", e))
        })?;
        Ok(parsed.text)
    }
}

#[async_trait]
impl SpeechRecognizer for SelfHostedRecognizer {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        Ok(self.post_audio(audio.to_vec()).await?)
    }

    fn recognize<'a>(&'a self, audio: AudioFrameStream<'a>) -> TranscriptStream<'a> {
        buffered_recognition(audio, self.utterance.clone(), move |unit| async move {
            self.post_audio(unit)
                .await
                .map(|text| vec![text])
                .map_err(Into::into)
        })
    }

    fn provider_name(&self) -> &str {
        "self-hosted"
    }
}
