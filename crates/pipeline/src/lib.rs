//! Per-session speech pipeline
//!
//! Features:
//! - Pluggable speech recognition (Google Speech-to-Text or a self-hosted `/stt` server)
//! - Pluggable speech synthesis (Google Text-to-Speech or a self-hosted `/tts` server)
//! - Session state, bounded history and serialised turns
//! - Orchestrator wiring audio in to audio out through bounded channels
//! - NDJSON codecs for the text streaming surface

mod backend;
pub mod fragments;
pub mod metrics;
pub mod ndjson;
pub mod orchestrator;
pub mod session;
pub mod stt;
pub mod tts;
pub mod turn;

pub use fragments::split_fragments;
pub use ndjson::{encode_line, NdjsonDecoder, TextChunkLine, TranscriptLine};
pub use orchestrator::{OrchestratorConfig, PipelineEvent, PipelineOrchestrator};
pub use session::{PipelineState, Session, SessionInfo};
pub use stt::{
    create_recognizer, CloudRecognizer, CloudSttConfig, SelfHostedRecognizer, SelfHostedSttConfig,
    UtteranceConfig,
};
pub use tts::{
    create_synthesizer, CloudSynthesizer, CloudTtsConfig, Rechunker, SelfHostedSynthesizer,
    SelfHostedTtsConfig,
};
pub use turn::{TurnOutcome, TurnProcessor};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{stage} timed out after {ms}ms")]
    Timeout { stage: &'static str, ms: u64 },

    #[error("Channel closed")]
    ChannelClosed,
}

impl From<PipelineError> for voice_agent_core::Error {
    fn from(err: PipelineError) -> Self {
        use voice_agent_core::Error;
        match err {
            PipelineError::Recognition(msg) => Error::Recognition(msg),
            PipelineError::Synthesis(msg) => Error::Synthesis(msg),
            PipelineError::Authentication(msg) => Error::Authentication(msg),
            PipelineError::InvalidInput(msg) => Error::Internal(msg),
            PipelineError::Configuration(msg) => Error::Configuration(msg),
            PipelineError::Timeout { stage, ms } => Error::Timeout { stage, ms },
            PipelineError::ChannelClosed => Error::ConnectionClosed,
        }
    }
}
