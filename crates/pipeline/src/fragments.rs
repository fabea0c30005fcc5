//! Cutting filtered answer text into synthesis fragments

use unicode_segmentation::UnicodeSegmentation;
use voice_agent_config::FragmentMode;

/// Split `text` into the fragments handed to the synthesizer.
///
/// `Words` yields each whitespace-separated word followed by one space,
/// which is also the shape of the `/stream` text chunks.
pub fn split_fragments(text: &str, mode: FragmentMode) -> Vec<String> {
    match mode {
        FragmentMode::Words => text
            .split_whitespace()
            .map(|word| format!("{} ", word))
            .collect(),
        FragmentMode::Sentences => text
            .unicode_sentences()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    }
}
