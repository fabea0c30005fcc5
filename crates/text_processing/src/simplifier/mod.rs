//! Text simplification for TTS

mod abbreviations;

pub use abbreviations::AbbreviationExpander;
