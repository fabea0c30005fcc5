//! Error taxonomy shared by every stage of the voice pipeline

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced across crate boundaries.
///
/// Each crate keeps its own error enum and converts into this one, so the
/// orchestrator only has to reason about a handful of outcomes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Unknown provider selection or otherwise unusable settings. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing or incorrect bearer token.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Recognition backend unreachable or audio rejected.
    #[error("Recognition error: {0}")]
    Recognition(String),

    /// One or both indexes unreachable.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Generative model call failed.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Synthesis backend unreachable or returned garbage.
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// A stage exceeded its time budget.
    #[error("{stage} timed out after {ms}ms")]
    Timeout { stage: &'static str, ms: u64 },

    /// The connection went away. Not a failure, triggers teardown.
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Only configuration problems stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    /// Static label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration",
            Error::Authentication(_) => "authentication",
            Error::Recognition(_) => "recognition",
            Error::Retrieval(_) => "retrieval",
            Error::Generation(_) => "generation",
            Error::Synthesis(_) => "synthesis",
            Error::Timeout { .. } => "timeout",
            Error::ConnectionClosed => "connection_closed",
            Error::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(Error::Configuration("bad provider".into()).is_fatal());
        assert!(!Error::Generation("model down".into()).is_fatal());
        assert!(!Error::ConnectionClosed.is_fatal());
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::Timeout {
            stage: "retrieval",
            ms: 1500,
        };
        assert_eq!(err.to_string(), "retrieval timed out after 1500ms");
        assert_eq!(err.kind(), "timeout");
    }
}
