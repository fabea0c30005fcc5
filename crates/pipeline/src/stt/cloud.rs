//! Google Cloud Speech-to-Text
//!
//! Not incrementally streaming. Caller audio is cut into units at pauses
//! (see [`UtteranceConfig`]) and each unit is one synchronous
//! `speech:recognize` request; every result in the response becomes one
//! final transcript. No partial transcripts are produced.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use voice_agent_config::Settings;
use voice_agent_core::{AudioEncoding, AudioFrameStream, Result, SpeechRecognizer, TranscriptStream};

use super::{buffered_recognition, UtteranceConfig};
use crate::backend::{build_client, status_error, transport_error, Stage};
use crate::PipelineError;

#[derive(Debug, Clone)]
pub struct CloudSttConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub language_code: String,
    pub sample_rate_hz: u32,
    pub encoding: AudioEncoding,
    pub enable_automatic_punctuation: bool,
    pub timeout: Duration,
}

impl CloudSttConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let google = &settings.google;
        Self {
            endpoint: google.speech_endpoint.trim_end_matches('/').to_string(),
            api_key: google.api_key.clone(),
            language_code: google.stt_language_code.clone(),
            sample_rate_hz: google.stt_sample_rate_hz,
            encoding: settings.media.inbound_encoding,
            enable_automatic_punctuation: google.enable_automatic_punctuation,
            timeout: Duration::from_millis(google.timeout_ms),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig<'a> {
    encoding: &'static str,
    sample_rate_hertz: u32,
    language_code: &'a str,
    enable_automatic_punctuation: bool,
}

#[derive(Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Serialize)]
struct RecognizeRequest<'a> {
    config: RecognitionConfig<'a>,
    audio: RecognitionAudio,
}

#[derive(Deserialize, Default)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
}

pub struct CloudRecognizer {
    client: reqwest::Client,
    config: CloudSttConfig,
    api_key: String,
    utterance: UtteranceConfig,
}

impl CloudRecognizer {
    pub fn new(config: CloudSttConfig, utterance: UtteranceConfig) -> std::result::Result<Self, PipelineError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                PipelineError::Configuration("google.api_key is required for Google STT".to_string())
            })?;

        Ok(Self {
            client: build_client(config.timeout)?,
            config,
            api_key,
            utterance,
        })
    }

    /// Transcribe one unit; one entry per recognition result
    async fn recognize_unit(&self, audio: &[u8]) -> std::result::Result<Vec<String>, PipelineError> {
        let request = RecognizeRequest {
            config: RecognitionConfig {
                encoding: self.config.encoding.api_name(),
                sample_rate_hertz: self.config.sample_rate_hz,
                language_code: &self.config.language_code,
                enable_automatic_punctuation: self.config.enable_automatic_punctuation,
            },
            audio: RecognitionAudio {
                content: STANDARD.encode(audio),
            },
        };

        let response = self
            .client
            .post(format!("{}/speech:recognize", self.config.endpoint))
            .query(&[("key", &self.api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(Stage::Recognition, self.config.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(Stage::Recognition, status, &body));
        }

        let parsed: RecognizeResponse = response.json().await.map_err(|e| {
            PipelineError::Recognition(format!("Failed to parse recognition response: {}", e))
        })?;

        Ok(parsed
            .results
            .into_iter()
            .filter_map(|r| r.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .collect())
    }
}

#[async_trait]
impl SpeechRecognizer for CloudRecognizer {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        let transcripts = self.recognize_unit(audio).await?;
        Ok(transcripts
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn recognize<'a>(&'a self, audio: AudioFrameStream<'a>) -> TranscriptStream<'a> {
        buffered_recognition(audio, self.utterance.clone(), move |unit| async move {
            self.recognize_unit(&unit).await.map_err(Into::into)
        })
    }

    fn provider_name(&self) -> &str {
        "google"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use voice_agent_core::{AudioFrame, Error};
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn recognizer(endpoint: &str) -> CloudRecognizer {
        CloudRecognizer::new(
            CloudSttConfig {
                endpoint: endpoint.to_string(),
                api_key: Some("test-key".to_string()),
                language_code: "en-US".to_string(),
                sample_rate_hz: 48_000,
                encoding: AudioEncoding::Linear16,
                enable_automatic_punctuation: true,
                timeout: Duration::from_secs(5),
            },
            UtteranceConfig {
                min_bytes: 1,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_recognize_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/speech:recognize"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "config": {
                    "encoding": "LINEAR16",
                    "sampleRateHertz": 48000,
                    "languageCode": "en-US",
                    "enableAutomaticPunctuation": true
                },
                "audio": { "content": "AQID" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    { "alternatives": [{ "transcript": "my internet is down", "confidence": 0.93 }] },
                    { "alternatives": [{ "transcript": " since this morning" }] }
                ]
            })))
            .mount(&server)
            .await;

        let stt = recognizer(&server.uri());
        let text = stt.transcribe(&[1, 2, 3]).await.unwrap();
        assert_eq!(text, "my internet is down since this morning");
    }

    #[tokio::test]
    async fn test_stream_emits_one_final_per_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/speech:recognize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    { "alternatives": [{ "transcript": "reset my router" }] },
                    { "alternatives": [] },
                    { "alternatives": [{ "transcript": "please" }] }
                ]
            })))
            // One unit of audio is one request
            .expect(1)
            .mount(&server)
            .await;

        let stt = recognizer(&server.uri());
        let frames = futures::stream::iter(vec![AudioFrame::new(
            vec![0u8; 64],
            AudioEncoding::Linear16,
            48_000,
            0,
        )]);
        let events: Vec<_> = stt
            .recognize(Box::pin(frames))
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.is_final));
        assert_eq!(events[0].text, "reset my router");
        assert_eq!(events[1].sequence, 1);
    }

    #[tokio::test]
    async fn test_empty_response_has_no_transcript() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let stt = recognizer(&server.uri());
        assert_eq!(stt.transcribe(&[0u8; 16]).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": { "code": 403, "message": "API key not valid" }
            })))
            .mount(&server)
            .await;

        let stt = recognizer(&server.uri());
        match stt.transcribe(&[0u8; 16]).await {
            Err(Error::Authentication(msg)) => assert_eq!(msg, "API key not valid"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_recognition_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let stt = recognizer(&server.uri());
        assert!(matches!(
            stt.transcribe(&[0u8; 16]).await,
            Err(Error::Recognition(_))
        ));
    }
}
