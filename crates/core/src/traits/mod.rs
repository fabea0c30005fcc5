//! Capability traits for pluggable backends
//!
//! - SpeechRecognizer: audio frames to transcript events
//! - SpeechSynthesizer: text fragments to audio chunks
//! - Responder: query plus history to a grounded answer

mod responder;
mod speech;

pub use responder::Responder;
pub use speech::{
    AudioChunkStream, AudioFrameStream, SpeechRecognizer, SpeechSynthesizer, TextFragmentStream,
    TranscriptStream,
};
