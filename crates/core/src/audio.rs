//! Audio frame and chunk types

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Audio container/encoding carried by a frame or chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    /// 16-bit signed PCM (little-endian)
    #[default]
    Linear16,
    /// WebM container with Opus payload
    WebmOpus,
    /// MPEG layer 3
    Mp3,
    /// RIFF/WAVE
    Wav,
}

impl AudioEncoding {
    /// Name used by cloud speech APIs
    pub fn api_name(&self) -> &'static str {
        match self {
            AudioEncoding::Linear16 => "LINEAR16",
            AudioEncoding::WebmOpus => "WEBM_OPUS",
            AudioEncoding::Mp3 => "MP3",
            AudioEncoding::Wav => "LINEAR16",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioEncoding::Linear16 => "audio/l16",
            AudioEncoding::WebmOpus => "audio/webm",
            AudioEncoding::Mp3 => "audio/mpeg",
            AudioEncoding::Wav => "audio/wav",
        }
    }
}

/// One decoded frame of caller audio as handed over by the media engine.
///
/// The payload is opaque here; recognizers decide how to package it.
#[derive(Clone)]
pub struct AudioFrame {
    pub data: Arc<[u8]>,
    pub encoding: AudioEncoding,
    pub sample_rate_hz: u32,
    /// Frame sequence number for ordering
    pub sequence: u64,
    /// When the frame was received
    pub timestamp: Instant,
}

impl std::fmt::Debug for AudioFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFrame")
            .field("bytes", &self.data.len())
            .field("encoding", &self.encoding)
            .field("sample_rate_hz", &self.sample_rate_hz)
            .field("sequence", &self.sequence)
            .finish()
    }
}

impl AudioFrame {
    pub fn new(data: Vec<u8>, encoding: AudioEncoding, sample_rate_hz: u32, sequence: u64) -> Self {
        Self {
            data: data.into(),
            encoding,
            sample_rate_hz,
            sequence,
            timestamp: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Synthesized audio on its way to the caller
#[derive(Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub data: Vec<u8>,
    /// Position within the session's outbound audio
    pub sequence: u64,
    /// Marks the end of one turn's audio. Marker chunks carry no data.
    pub end_of_stream: bool,
}

impl std::fmt::Debug for AudioChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioChunk")
            .field("bytes", &self.data.len())
            .field("sequence", &self.sequence)
            .field("end_of_stream", &self.end_of_stream)
            .finish()
    }
}

impl AudioChunk {
    pub fn new(data: Vec<u8>, sequence: u64) -> Self {
        Self {
            data,
            sequence,
            end_of_stream: false,
        }
    }

    /// Empty chunk closing a turn
    pub fn end_marker(sequence: u64) -> Self {
        Self {
            data: Vec::new(),
            sequence,
            end_of_stream: true,
        }
    }
}
