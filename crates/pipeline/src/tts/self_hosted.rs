//! Self-hosted model server (`POST /tts`)
//!
//! The response body is streamed and handed on in fixed-size chunks.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use std::time::Duration;

use voice_agent_config::SelfHostedConfig;
use voice_agent_core::{AudioChunk, AudioChunkStream, Result, SpeechSynthesizer, TextFragmentStream};

use crate::backend::{build_client, status_error, transport_error, Stage};
use crate::PipelineError;

#[derive(Debug, Clone)]
pub struct SelfHostedTtsConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub chunk_size: usize,
    pub timeout: Duration,
}

impl From<&SelfHostedConfig> for SelfHostedTtsConfig {
    fn from(config: &SelfHostedConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            chunk_size: config.tts_chunk_size,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

/// Cuts a byte stream into chunks of exactly `size` bytes (the last may be shorter)
#[derive(Debug)]
pub struct Rechunker {
    size: usize,
    pending: Vec<u8>,
}

impl Rechunker {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            pending: Vec::with_capacity(size),
        }
    }

    /// Add bytes; returns every chunk that is now complete
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(bytes);
        let mut chunks = Vec::new();
        while self.pending.len() >= self.size {
            let rest = self.pending.split_off(self.size);
            chunks.push(std::mem::replace(&mut self.pending, rest));
        }
        chunks
    }

    /// Remaining partial chunk, if any
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
}

pub struct SelfHostedSynthesizer {
    client: reqwest::Client,
    config: SelfHostedTtsConfig,
}

impl SelfHostedSynthesizer {
    pub fn new(config: SelfHostedTtsConfig) -> std::result::Result<Self, PipelineError> {
        if config.chunk_size == 0 {
            return Err(PipelineError::Configuration(
                "self_hosted.tts_chunk_size must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            client: build_client(config.timeout)?,
            config,
        })
    }

    async fn send(&self, text: &str) -> std::result::Result<reqwest::Response, PipelineError> {
        let mut request = self
            .client
            .post(format!("{}/tts", self.config.base_url))
            .json(&TtsRequest { text });
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(Stage::Synthesis, self.config.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(Stage::Synthesis, status, &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl SpeechSynthesizer for SelfHostedSynthesizer {
    async fn synthesize_text(&self, text: &str) -> Result<Vec<u8>> {
        let response = self.send(text).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(Stage::Synthesis, self.config.timeout, e))?;
        Ok(bytes.to_vec())
    }

    fn synthesize<'a>(&'a self, fragments: TextFragmentStream<'a>) -> AudioChunkStream<'a> {
        Box::pin(async_stream::stream! {
            let mut fragments = fragments;
            let mut sequence = 0u64;

            'fragments: while let Some(fragment) = fragments.next().await {
                if fragment.trim().is_empty() {
                    continue;
                }
                let response = match self.send(&fragment).await {
                    Ok(response) => response,
                    Err(e) => {
                        yield Err(e.into());
                        break;
                    }
                };

                let mut rechunker = Rechunker::new(self.config.chunk_size);
                let mut body = response.bytes_stream();
                while let Some(bytes) = body.next().await {
                    let bytes = match bytes {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            yield Err(transport_error(Stage::Synthesis, self.config.timeout, e).into());
                            break 'fragments;
                        }
                    };
                    for chunk in rechunker.push(&bytes) {
                        yield Ok(AudioChunk::new(chunk, sequence));
                        sequence += 1;
                    }
                }
                if let Some(chunk) = rechunker.finish() {
                    yield Ok(AudioChunk::new(chunk, sequence));
                    sequence += 1;
                }
            }
        })
    }

    fn provider_name(&self) -> &str {
        "self-hosted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_agent_core::Error;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn synthesizer(base_url: &str, chunk_size: usize) -> SelfHostedSynthesizer {
        SelfHostedSynthesizer::new(SelfHostedTtsConfig {
            base_url: base_url.to_string(),
            auth_token: Some("secret".to_string()),
            chunk_size,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_rechunker() {
        let mut rechunker = Rechunker::new(4);
        assert!(rechunker.push(&[1, 2, 3]).is_empty());
        assert_eq!(rechunker.push(&[4, 5, 6, 7, 8, 9]), vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]]);
        assert_eq!(rechunker.finish(), Some(vec![9]));
        assert_eq!(rechunker.finish(), None);
    }

    #[tokio::test]
    async fn test_rechunks_each_fragment_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tts"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(serde_json::json!({ "text": "Hello " })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 10]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/tts"))
            .and(body_json(serde_json::json!({ "text": "there " })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2u8; 3]))
            .mount(&server)
            .await;

        let tts = synthesizer(&server.uri(), 4);
        let fragments = futures::stream::iter(vec!["Hello ".to_string(), "there ".to_string()]);
        let chunks: Vec<AudioChunk> = tts
            .synthesize(Box::pin(fragments))
            .map(|c| c.unwrap())
            .collect()
            .await;

        let sizes: Vec<usize> = chunks.iter().map(|c| c.data.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2, 3]);
        assert_eq!(chunks[3].data, vec![2, 2, 2]);
        assert!(chunks.windows(2).all(|w| w[0].sequence + 1 == w[1].sequence));
    }

    #[tokio::test]
    async fn test_synthesize_text_returns_whole_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tts"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFF....".to_vec()))
            .mount(&server)
            .await;

        let tts = synthesizer(&server.uri(), 1024);
        assert_eq!(tts.synthesize_text("hi").await.unwrap(), b"RIFF....".to_vec());
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tts"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(serde_json::json!({ "error": "Unauthorized" })),
            )
            .mount(&server)
            .await;

        let tts = synthesizer(&server.uri(), 1024);
        assert!(matches!(
            tts.synthesize_text("hi").await,
            Err(Error::Authentication(_))
        ));
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let result = SelfHostedSynthesizer::new(SelfHostedTtsConfig {
            base_url: "http://localhost".to_string(),
            auth_token: None,
            chunk_size: 0,
            timeout: Duration::from_secs(1),
        });
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }
}
