//! Generative model integration
//!
//! Features:
//! - Cloud (Gemini) and self-hosted (Ollama) backends behind one trait
//! - Exponential-backoff retry on transient failures
//! - Backend selection from settings

pub mod backend;
pub mod factory;
pub mod gemini;
pub mod prompt;

pub use backend::{FinishReason, GenerationResult, LlmBackend, LlmConfig, OllamaBackend};
pub use factory::create_backend;
pub use gemini::GeminiBackend;
pub use prompt::{Message, Role};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for voice_agent_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Configuration(msg) => voice_agent_core::Error::Configuration(msg),
            other => voice_agent_core::Error::Generation(other.to_string()),
        }
    }
}
