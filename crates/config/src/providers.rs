//! Backend selection enums
//!
//! Provider kinds are parsed from plain strings so that an unknown value
//! is reported as a configuration error naming the offending field.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Speech backend selection for recognition or synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum ProviderKind {
    /// Google Cloud speech APIs
    #[default]
    Google,
    /// Model server speaking the `/stt` and `/tts` contract
    SelfHosted,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::SelfHosted => "self-hosted",
        }
    }

    pub fn is_cloud(&self) -> bool {
        matches!(self, ProviderKind::Google)
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(ProviderKind::Google),
            "self-hosted" | "self_hosted" => Ok(ProviderKind::SelfHosted),
            other => Err(format!(
                "unknown provider '{}', expected 'google' or 'self-hosted'",
                other
            )),
        }
    }
}

impl TryFrom<String> for ProviderKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProviderKind> for String {
    fn from(kind: ProviderKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embedding and generative model host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[default]
    Gemini,
    Ollama,
}

/// How filtered answer text is cut into synthesis fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FragmentMode {
    /// One fragment per word, each with a trailing space
    #[default]
    Words,
    /// One fragment per sentence
    Sentences,
}

/// What happens to caller audio that arrives while a turn is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusyAudioPolicy {
    /// Discard it; the current turn is never interrupted
    #[default]
    Drop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("google".parse::<ProviderKind>(), Ok(ProviderKind::Google));
        assert_eq!(
            "Self-Hosted".parse::<ProviderKind>(),
            Ok(ProviderKind::SelfHosted)
        );
        assert!("azure".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_serde_round_trip() {
        let json = serde_json::to_string(&ProviderKind::SelfHosted).unwrap();
        assert_eq!(json, "\"self-hosted\"");
        let err = serde_json::from_str::<ProviderKind>("\"whisper\"").unwrap_err();
        assert!(err.to_string().contains("unknown provider"));
    }
}
