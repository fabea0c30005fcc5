//! Transcript events produced by speech recognition

use serde::{Deserialize, Serialize};

/// A recognized text fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub text: String,
    /// Final results are complete and will not be revised
    pub is_final: bool,
    /// Monotonically increasing within one recognition stream
    pub sequence: u64,
}

impl TranscriptEvent {
    pub fn partial(text: impl Into<String>, sequence: u64) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            sequence,
        }
    }

    pub fn final_result(text: impl Into<String>, sequence: u64) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            sequence,
        }
    }
}

/// Concatenates fragments as the recognizer supplied them until a final
/// event flushes them into one query.
#[derive(Debug, Default)]
pub struct TranscriptBuffer {
    pending: String,
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed an event. Returns the complete query when the event is final.
    ///
    /// Returns `None` for a final event whose accumulated text is blank.
    pub fn push(&mut self, event: &TranscriptEvent) -> Option<String> {
        self.pending.push_str(&event.text);
        if !event.is_final {
            return None;
        }
        let query = std::mem::take(&mut self.pending);
        let query = query.trim();
        if query.is_empty() {
            None
        } else {
            Some(query.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}
