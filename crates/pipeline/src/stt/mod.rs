//! Speech-to-text backends
//!
//! Both variants are request/response: caller audio is buffered into units
//! (closed by a pause, a size cap or the end of the audio) and each unit is
//! sent in one call. Every transcript they emit is final.

mod cloud;
mod self_hosted;

pub use cloud::{CloudRecognizer, CloudSttConfig};
pub use self_hosted::{SelfHostedRecognizer, SelfHostedSttConfig};

use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use voice_agent_config::{PipelineSettings, ProviderKind, Settings};
use voice_agent_core::{
    AudioFrameStream, Error, Result, SpeechRecognizer, TranscriptEvent, TranscriptStream,
};

use crate::PipelineError;

/// How caller audio is cut into units
#[derive(Debug, Clone)]
pub struct UtteranceConfig {
    /// Pause that closes a unit
    pub gap: Duration,
    pub max_bytes: usize,
    /// Units below this size are discarded unheard
    pub min_bytes: usize,
    /// Upper bound for one backend call
    pub timeout: Duration,
}

impl Default for UtteranceConfig {
    fn default() -> Self {
        Self::from(&PipelineSettings::default())
    }
}

impl From<&PipelineSettings> for UtteranceConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            gap: Duration::from_millis(settings.utterance_gap_ms),
            max_bytes: settings.max_utterance_bytes,
            min_bytes: settings.min_utterance_bytes,
            timeout: Duration::from_millis(settings.recognition_timeout_ms),
        }
    }
}

enum Step {
    Frame(voice_agent_core::AudioFrame),
    Gap,
    End,
}

/// Buffer `audio` into units and transcribe each with `transcribe_unit`.
///
/// Yields one final event per non-blank transcript. The first error (or
/// timeout) is yielded and ends the stream.
pub(crate) fn buffered_recognition<'a, F, Fut>(
    mut audio: AudioFrameStream<'a>,
    config: UtteranceConfig,
    mut transcribe_unit: F,
) -> TranscriptStream<'a>
where
    F: FnMut(Vec<u8>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Vec<String>>> + Send + 'a,
{
    Box::pin(async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        let mut sequence = 0u64;

        loop {
            let step = if buffer.is_empty() {
                match audio.next().await {
                    Some(frame) => Step::Frame(frame),
                    None => Step::End,
                }
            } else {
                match tokio::time::timeout(config.gap, audio.next()).await {
                    Ok(Some(frame)) => Step::Frame(frame),
                    Ok(None) => Step::End,
                    Err(_) => Step::Gap,
                }
            };

            let ended = matches!(step, Step::End);
            if let Step::Frame(frame) = step {
                buffer.extend_from_slice(&frame.data);
                if buffer.len() < config.max_bytes {
                    continue;
                }
            }

            let unit = std::mem::take(&mut buffer);
            if unit.len() >= config.min_bytes {
                let started = std::time::Instant::now();
                match tokio::time::timeout(config.timeout, transcribe_unit(unit)).await {
                    Ok(Ok(transcripts)) => {
                        crate::metrics::record_stage_latency("recognition", started.elapsed());
                        for text in transcripts {
                            let text = text.trim();
                            if text.is_empty() {
                                continue;
                            }
                            yield Ok(TranscriptEvent::final_result(text, sequence));
                            sequence += 1;
                        }
                    }
                    Ok(Err(e)) => {
                        yield Err(e);
                        break;
                    }
                    Err(_) => {
                        yield Err(Error::Timeout {
                            stage: "recognition",
                            ms: config.timeout.as_millis() as u64,
                        });
                        break;
                    }
                }
            } else if !unit.is_empty() {
                tracing::debug!(bytes = unit.len(), "Discarding short audio unit");
            }

            if ended {
                break;
            }
        }
    })
}

/// Build the recognizer selected by `providers.stt`
pub fn create_recognizer(settings: &Settings) -> std::result::Result<Arc<dyn SpeechRecognizer>, PipelineError> {
    let utterance = UtteranceConfig::from(&settings.pipeline);
    let recognizer: Arc<dyn SpeechRecognizer> = match settings.providers.stt {
        ProviderKind::Google => Arc::new(CloudRecognizer::new(
            CloudSttConfig::from_settings(settings),
            utterance,
        )?),
        ProviderKind::SelfHosted => Arc::new(SelfHostedRecognizer::new(
            SelfHostedSttConfig::from(&settings.self_hosted),
            utterance,
        )?),
    };
    tracing::info!(provider = recognizer.provider_name(), "Speech recognizer ready");
    Ok(recognizer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use voice_agent_core::{AudioEncoding, AudioFrame};

    fn frame(bytes: usize, sequence: u64) -> AudioFrame {
        AudioFrame::new(vec![1u8; bytes], AudioEncoding::Linear16, 48_000, sequence)
    }

    fn config() -> UtteranceConfig {
        UtteranceConfig {
            gap: Duration::from_millis(100),
            max_bytes: 1_000,
            min_bytes: 10,
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_units_close_at_size_cap_and_end() {
        let units = Arc::new(Mutex::new(Vec::new()));
        let seen = units.clone();

        let frames = futures::stream::iter(vec![frame(600, 0), frame(600, 1), frame(50, 2)]);
        let events: Vec<_> = buffered_recognition(Box::pin(frames), config(), move |unit| {
            seen.lock().push(unit.len());
            async move { Ok(vec![format!("unit of {}", unit.len())]) }
        })
        .collect()
        .await;

        assert_eq!(*units.lock(), vec![1_200, 50]);
        assert_eq!(events.len(), 2);
        let second = events[1].as_ref().unwrap();
        assert!(second.is_final);
        assert_eq!(second.sequence, 1);
        assert_eq!(second.text, "unit of 50");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_closes_unit() {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let frames = tokio_stream::wrappers::ReceiverStream::new(rx);
        let mut events = buffered_recognition(Box::pin(frames), config(), |unit| async move {
            Ok(vec![format!("{}", unit.len())])
        });

        tx.send(frame(100, 0)).await.unwrap();
        tx.send(frame(100, 1)).await.unwrap();
        let first = events.next().await.unwrap().unwrap();
        assert_eq!(first.text, "200");

        tx.send(frame(300, 2)).await.unwrap();
        drop(tx);
        let second = events.next().await.unwrap().unwrap();
        assert_eq!(second.text, "300");
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_short_units_and_blank_transcripts_are_skipped() {
        let frames = futures::stream::iter(vec![frame(5, 0)]);
        let events: Vec<_> = buffered_recognition(Box::pin(frames), config(), |_| async {
            Ok(vec!["never".to_string()])
        })
        .collect()
        .await;
        assert!(events.is_empty());

        let frames = futures::stream::iter(vec![frame(50, 0)]);
        let events: Vec<_> = buffered_recognition(Box::pin(frames), config(), |_| async {
            Ok(vec!["  ".to_string()])
        })
        .collect()
        .await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let frames = futures::stream::iter(vec![frame(1_000, 0), frame(1_000, 1)]);
        let events: Vec<_> = buffered_recognition(Box::pin(frames), config(), |_| async {
            Err(Error::Recognition("backend down".to_string()))
        })
        .collect()
        .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(Error::Recognition(_))));
    }

    #[test]
    fn test_factory_selects_self_hosted() {
        let mut settings = Settings::default();
        settings.providers.stt = ProviderKind::SelfHosted;
        let recognizer = create_recognizer(&settings).unwrap();
        assert_eq!(recognizer.provider_name(), "self-hosted");
    }

    #[test]
    fn test_factory_rejects_google_without_key() {
        let mut settings = Settings::default();
        settings.providers.stt = ProviderKind::Google;
        settings.google.api_key = None;
        assert!(matches!(
            create_recognizer(&settings),
            Err(PipelineError::Configuration(_))
        ));
    }
}
