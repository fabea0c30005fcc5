//! Core traits and types for the voice agent
//!
//! This crate provides foundational types used across all other crates:
//! - Capability traits for pluggable backends (recognition, synthesis, answering)
//! - Audio frame and chunk types
//! - Transcript events and the partial-transcript buffer
//! - Bounded conversation history
//! - Retrieval hits, fused rankings and answers
//! - Error taxonomy

pub mod audio;
pub mod conversation;
pub mod error;
pub mod retrieval;
pub mod traits;
pub mod transcript;

pub use audio::{AudioChunk, AudioEncoding, AudioFrame};
pub use conversation::{render_history, ConversationHistory, HistoryEntry, Speaker};
pub use error::{Error, Result};
pub use retrieval::{AnswerResult, FusedRanking, HitOrigin, RetrievalHit};
pub use transcript::{TranscriptBuffer, TranscriptEvent};

pub use traits::{
    AudioChunkStream, AudioFrameStream, Responder, SpeechRecognizer, SpeechSynthesizer,
    TextFragmentStream, TranscriptStream,
};
