//! Newline-delimited JSON between pipeline stages
//!
//! Inbound lines carry transcript events (`{"text", "is_final"}`), outbound
//! lines carry answer text chunks (`{"text_chunk"}`).

use serde::{Deserialize, Serialize};
use voice_agent_core::TranscriptEvent;

use crate::PipelineError;

/// One recognized transcript line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    #[serde(default)]
    pub text: String,
    /// Absent means final
    #[serde(default = "default_is_final")]
    pub is_final: bool,
}

fn default_is_final() -> bool {
    true
}

impl TranscriptLine {
    pub fn into_event(self, sequence: u64) -> TranscriptEvent {
        TranscriptEvent {
            text: self.text,
            is_final: self.is_final,
            sequence,
        }
    }
}

/// One outbound text chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunkLine {
    pub text_chunk: String,
}

/// Serialize one value as a line terminated by `\n`
pub fn encode_line<T: Serialize>(value: &T) -> Result<String, PipelineError> {
    let mut line =
        serde_json::to_string(value).map_err(|e| PipelineError::InvalidInput(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Incremental line splitter for byte streams that cut lines arbitrarily
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes; returns every complete, non-blank line decoded
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<TranscriptLine, PipelineError>> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(decoded) = decode_line(&line[..line.len() - 1]) {
                lines.push(decoded);
            }
        }
        lines
    }

    /// Decode whatever is left once the input has ended
    pub fn finish(&mut self) -> Option<Result<TranscriptLine, PipelineError>> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest)
    }
}

fn decode_line(bytes: &[u8]) -> Option<Result<TranscriptLine, PipelineError>> {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.trim(),
        Err(e) => return Some(Err(PipelineError::InvalidInput(e.to_string()))),
    };
    if text.is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).map_err(|e| PipelineError::InvalidInput(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_is_final_means_final() {
        let line: TranscriptLine = serde_json::from_str(r#"{"text": "hello"}"#).unwrap();
        assert!(line.is_final);

        let line: TranscriptLine =
            serde_json::from_str(r#"{"text": "hel", "is_final": false}"#).unwrap();
        assert!(!line.is_final);
    }

    #[test]
    fn test_encode_text_chunk() {
        let line = encode_line(&TextChunkLine {
            text_chunk: "Restart ".to_string(),
        })
        .unwrap();
        assert_eq!(line, "{\"text_chunk\":\"Restart \"}\n");
    }

    #[test]
    fn test_decoder_handles_split_lines() {
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.push(br#"{"text":"my inter"#).is_empty());

        let lines = decoder.push(b"net\",\"is_final\":false}\n\n{\"text\":\"is down\"}");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].as_ref().unwrap().text, "my internet");

        let last = decoder.finish().unwrap().unwrap();
        assert_eq!(last.text, "is down");
        assert!(last.is_final);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_decoder_reports_bad_json() {
        let mut decoder = NdjsonDecoder::new();
        let lines = decoder.push(b"not json\n");
        assert!(matches!(lines[0], Err(PipelineError::InvalidInput(_))));
    }
}
