//! Google Cloud Text-to-Speech

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use voice_agent_config::GoogleConfig;
use voice_agent_core::{AudioChunk, AudioChunkStream, Result, SpeechSynthesizer, TextFragmentStream};

use crate::backend::{build_client, status_error, transport_error, Stage};
use crate::PipelineError;

#[derive(Debug, Clone)]
pub struct CloudTtsConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub language_code: String,
    pub voice_name: String,
    /// `MP3`, `LINEAR16`, `OGG_OPUS`, ...
    pub audio_encoding: String,
    pub timeout: Duration,
}

impl From<&GoogleConfig> for CloudTtsConfig {
    fn from(google: &GoogleConfig) -> Self {
        Self {
            endpoint: google.tts_endpoint.trim_end_matches('/').to_string(),
            api_key: google.api_key.clone(),
            language_code: google.tts_language_code.clone(),
            voice_name: google.tts_voice_name.clone(),
            audio_encoding: google.tts_audio_encoding.clone(),
            timeout: Duration::from_millis(google.timeout_ms),
        }
    }
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig<'a> {
    audio_encoding: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig<'a>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

pub struct CloudSynthesizer {
    client: reqwest::Client,
    config: CloudTtsConfig,
    api_key: String,
}

impl CloudSynthesizer {
    pub fn new(config: CloudTtsConfig) -> std::result::Result<Self, PipelineError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                PipelineError::Configuration("google.api_key is required for Google TTS".to_string())
            })?;

        Ok(Self {
            client: build_client(config.timeout)?,
            config,
            api_key,
        })
    }

    async fn request_audio(&self, text: &str) -> std::result::Result<Vec<u8>, PipelineError> {
        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.config.language_code,
                name: &self.config.voice_name,
            },
            audio_config: AudioConfig {
                audio_encoding: &self.config.audio_encoding,
            },
        };

        let response = self
            .client
            .post(format!("{}/text:synthesize", self.config.endpoint))
            .query(&[("key", &self.api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(Stage::Synthesis, self.config.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(Stage::Synthesis, status, &body));
        }

        let parsed: SynthesizeResponse = response.json().await.map_err(|e| {
            PipelineError::Synthesis(format!("Failed to parse synthesis response: {}", e))
        })?;

        STANDARD
            .decode(parsed.audio_content.as_bytes())
            .map_err(|e| PipelineError::Synthesis(format!("Invalid audioContent: {}", e)))
    }
}

#[async_trait]
impl SpeechSynthesizer for CloudSynthesizer {
    async fn synthesize_text(&self, text: &str) -> Result<Vec<u8>> {
        Ok(self.request_audio(text).await?)
    }

    fn synthesize<'a>(&'a self, fragments: TextFragmentStream<'a>) -> AudioChunkStream<'a> {
        Box::pin(async_stream::stream! {
            let mut fragments = fragments;
            let mut sequence = 0u64;

            while let Some(fragment) = fragments.next().await {
                if fragment.trim().is_empty() {
                    continue;
                }
                match self.request_audio(&fragment).await {
                    Ok(audio) => {
                        yield Ok(AudioChunk::new(audio, sequence));
                        sequence += 1;
                    }
                    Err(e) => {
                        yield Err(e.into());
                        break;
                    }
                }
            }
        })
    }

    fn provider_name(&self) -> &str {
        "google"
    }
}
