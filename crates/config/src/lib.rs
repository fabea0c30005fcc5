//! Configuration management for the voice agent
//!
//! Supports loading configuration from:
//! - YAML/TOML files under `config/`
//! - Environment variables (VOICE_AGENT_ prefix, `__` separator)
//! - The flat deployment variables (`STT_PROVIDER`, `TTS_PROVIDER`,
//!   `MCP_AUTH_TOKEN`, `MCP_URL`, `PORT`, `GOOGLE_API_KEY`, `AGENT_URL`)
//!
//! Settings are read once at process start. Anything invalid, including an
//! unknown provider name, is a fatal configuration error.

pub mod constants;
pub mod providers;
pub mod settings;

pub use providers::{BusyAudioPolicy, FragmentMode, ModelProvider, ProviderKind};
pub use settings::{
    load_settings, load_settings_from, AuthConfig, GoogleConfig, LlmSettings, MediaConfig,
    ObservabilityConfig, PipelineSettings, ProvidersConfig, RagConfig, RuntimeEnvironment,
    SelfHostedConfig, ServerConfig, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for voice_agent_core::Error {
    fn from(err: ConfigError) -> Self {
        voice_agent_core::Error::Configuration(err.to_string())
    }
}
