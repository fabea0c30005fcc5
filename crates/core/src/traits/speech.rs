//! Speech processing traits

use crate::{AudioChunk, AudioFrame, Result, TranscriptEvent};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

pub type AudioFrameStream<'a> = Pin<Box<dyn Stream<Item = AudioFrame> + Send + 'a>>;
pub type TranscriptStream<'a> = Pin<Box<dyn Stream<Item = Result<TranscriptEvent>> + Send + 'a>>;
pub type TextFragmentStream<'a> = Pin<Box<dyn Stream<Item = String> + Send + 'a>>;
pub type AudioChunkStream<'a> = Pin<Box<dyn Stream<Item = Result<AudioChunk>> + Send + 'a>>;

/// Speech recognition backend
///
/// Implementations:
/// - `CloudRecognizer` - Google Speech-to-Text
/// - `SelfHostedRecognizer` - model server speaking the `/stt` contract
///
/// # Example
///
/// ```ignore
/// let stt: Arc<dyn SpeechRecognizer> = create_recognizer(&settings)?;
/// let mut events = stt.recognize(Box::pin(frames));
/// while let Some(event) = events.next().await {
///     println!("{}", event?.text);
/// }
/// ```
#[async_trait]
pub trait SpeechRecognizer: Send + Sync + 'static {
    /// Transcribe one buffered unit of audio
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;

    /// Stream transcript events as audio arrives
    ///
    /// The stream ends when the audio source ends. After yielding an error
    /// the stream is finished; callers restart recognition if they want more.
    fn recognize<'a>(&'a self, audio: AudioFrameStream<'a>) -> TranscriptStream<'a>;

    /// Get provider name for logging
    fn provider_name(&self) -> &str;
}

/// Speech synthesis backend
///
/// One synthesis call per fragment. Implementations may split a fragment's
/// audio into several chunks but never reorder them.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + 'static {
    /// Synthesize a single piece of text
    async fn synthesize_text(&self, text: &str) -> Result<Vec<u8>>;

    /// Synthesize a stream of text fragments into a stream of audio chunks
    fn synthesize<'a>(&'a self, fragments: TextFragmentStream<'a>) -> AudioChunkStream<'a>;

    /// Get provider name for logging
    fn provider_name(&self) -> &str;
}
