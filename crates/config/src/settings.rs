//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{endpoints, llm, pipeline, rag, sessions, speech};
use crate::providers::{BusyAudioPolicy, FragmentMode, ModelProvider, ProviderKind};
use crate::ConfigError;
use voice_agent_core::AudioEncoding;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    /// Recognition and synthesis backend selection
    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub google: GoogleConfig,

    #[serde(default)]
    pub self_hosted: SelfHostedConfig,

    #[serde(default)]
    pub rag: RagConfig,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Downstream agent URL of split deployments. Recorded, not dialled.
    #[serde(default)]
    pub agent_url: Option<String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_providers()?;
        self.validate_rag()?;
        self.validate_llm()?;
        self.validate_pipeline()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        let server = &self.server;

        if server.port == 0 {
            return Err(invalid("server.port", "Port must be non-zero"));
        }

        if server.max_sessions == 0 {
            return Err(invalid("server.max_sessions", "Must allow at least one session"));
        }

        if server.session_idle_timeout_secs == 0 || server.cleanup_interval_secs == 0 {
            return Err(invalid(
                "server.session_idle_timeout_secs",
                "Session timeout and cleanup interval must be non-zero",
            ));
        }

        if server.auth.enabled && server.auth.token.as_deref().map_or(true, str::is_empty) {
            return Err(invalid(
                "server.auth.token",
                "A token must be set when auth is enabled",
            ));
        }

        Ok(())
    }

    fn validate_providers(&self) -> Result<(), ConfigError> {
        let uses_google = self.providers.stt.is_cloud() || self.providers.tts.is_cloud();
        let uses_self_hosted = !self.providers.stt.is_cloud() || !self.providers.tts.is_cloud();

        if uses_google && self.google.api_key.as_deref().map_or(true, str::is_empty) {
            if self.environment.is_strict() {
                return Err(invalid(
                    "google.api_key",
                    "Google provider selected but no API key configured",
                ));
            }
            tracing::warn!("Google provider selected but google.api_key is not set");
        }

        if uses_self_hosted && self.self_hosted.base_url.trim().is_empty() {
            return Err(invalid(
                "self_hosted.base_url",
                "Self-hosted provider selected but no base URL configured",
            ));
        }

        if uses_self_hosted && self.self_hosted.auth_token.is_none() {
            tracing::warn!("Self-hosted provider selected but self_hosted.auth_token is not set");
        }

        if self.self_hosted.tts_chunk_size == 0 {
            return Err(invalid("self_hosted.tts_chunk_size", "Must be non-zero"));
        }

        Ok(())
    }

    fn validate_rag(&self) -> Result<(), ConfigError> {
        let rag = &self.rag;

        if !(rag.rrf_k > 0.0) || !rag.rrf_k.is_finite() {
            return Err(invalid(
                "rag.rrf_k",
                format!("Must be a positive number, got {}", rag.rrf_k),
            ));
        }

        if rag.retrieve_n == 0 {
            return Err(invalid("rag.retrieve_n", "Must be at least 1"));
        }

        if rag.fusion_top_m == 0 || rag.fusion_top_m > rag.retrieve_n * 2 {
            return Err(invalid(
                "rag.fusion_top_m",
                format!(
                    "Must be between 1 and {} (two lists of retrieve_n), got {}",
                    rag.retrieve_n * 2,
                    rag.fusion_top_m
                ),
            ));
        }

        if rag.dense_timeout_ms == 0 || rag.sparse_timeout_ms == 0 {
            return Err(invalid("rag.dense_timeout_ms", "Retrieval timeouts must be non-zero"));
        }

        if rag.chunk_size == 0 || rag.chunk_overlap >= rag.chunk_size {
            return Err(invalid(
                "rag.chunk_overlap",
                format!(
                    "Overlap must be smaller than a non-zero chunk size, got {} / {}",
                    rag.chunk_overlap, rag.chunk_size
                ),
            ));
        }

        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        if self.llm.timeout_ms == 0 {
            return Err(invalid("llm.timeout_ms", "Must be non-zero"));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(invalid(
                "llm.temperature",
                format!("Must be between 0.0 and 2.0, got {}", self.llm.temperature),
            ));
        }

        Ok(())
    }

    fn validate_pipeline(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;

        if p.max_history == 0 {
            return Err(invalid("pipeline.max_history", "Must be at least 1"));
        }

        let capacities = [
            ("pipeline.frame_channel_capacity", p.frame_channel_capacity),
            ("pipeline.transcript_channel_capacity", p.transcript_channel_capacity),
            ("pipeline.fragment_channel_capacity", p.fragment_channel_capacity),
            ("pipeline.audio_out_capacity", p.audio_out_capacity),
        ];
        for (field, value) in capacities {
            if value == 0 {
                return Err(invalid(field, "Channel capacity must be non-zero"));
            }
        }

        let timeouts = [
            ("pipeline.recognition_timeout_ms", p.recognition_timeout_ms),
            ("pipeline.generation_timeout_ms", p.generation_timeout_ms),
            ("pipeline.synthesis_timeout_ms", p.synthesis_timeout_ms),
            ("pipeline.utterance_gap_ms", p.utterance_gap_ms),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(invalid(field, "Timeout must be non-zero"));
            }
        }

        if p.min_utterance_bytes > p.max_utterance_bytes {
            return Err(invalid(
                "pipeline.min_utterance_bytes",
                "Must not exceed pipeline.max_utterance_bytes",
            ));
        }

        if p.generation_failure_message.trim().is_empty() {
            return Err(invalid(
                "pipeline.generation_failure_message",
                "Callers must be told when no answer could be produced",
            ));
        }

        Ok(())
    }

    /// Apply the flat variables used by existing deployments.
    ///
    /// These win over file and `VOICE_AGENT__` sources.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("STT_PROVIDER") {
            self.providers.stt = value
                .parse()
                .map_err(|message| invalid("STT_PROVIDER", message))?;
        }

        if let Some(value) = lookup("TTS_PROVIDER") {
            self.providers.tts = value
                .parse()
                .map_err(|message| invalid("TTS_PROVIDER", message))?;
        }

        if let Some(token) = lookup("MCP_AUTH_TOKEN") {
            self.self_hosted.auth_token = Some(token.clone());
            if self.server.auth.token.is_none() {
                self.server.auth.token = Some(token);
            }
        }

        if let Some(url) = lookup("MCP_URL") {
            self.self_hosted.base_url = url;
        }

        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| invalid("PORT", format!("'{}' is not a valid port", port)))?;
        }

        if let Some(key) = lookup("GOOGLE_API_KEY") {
            self.google.api_key = Some(key.clone());
            if self.llm.api_key.is_none() {
                self.llm.api_key = Some(key.clone());
            }
            if self.rag.embedding_api_key.is_none() {
                self.rag.embedding_api_key = Some(key);
            }
        }

        if let Some(url) = lookup("AGENT_URL") {
            self.agent_url = Some(url);
        }

        Ok(())
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Upper bound on live sessions in the registry
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    #[serde(default = "default_idle_timeout")]
    pub session_idle_timeout_secs: u64,

    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}

fn default_max_sessions() -> usize {
    sessions::MAX_SESSIONS
}

fn default_idle_timeout() -> u64 {
    sessions::IDLE_TIMEOUT_SECS
}

fn default_cleanup_interval() -> u64 {
    sessions::CLEANUP_INTERVAL_SECS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            max_sessions: default_max_sessions(),
            session_idle_timeout_secs: default_idle_timeout(),
            cleanup_interval_secs: default_cleanup_interval(),
            auth: AuthConfig::default(),
        }
    }
}

/// Shared-secret bearer authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Expected bearer token (set via VOICE_AGENT__SERVER__AUTH__TOKEN or MCP_AUTH_TOKEN)
    #[serde(default)]
    pub token: Option<String>,

    /// Paths that bypass authentication
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

fn default_public_paths() -> Vec<String> {
    vec![
        "/health".to_string(),
        "/ready".to_string(),
        "/metrics".to_string(),
    ]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: None,
            public_paths: default_public_paths(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub stt: ProviderKind,

    #[serde(default)]
    pub tts: ProviderKind,
}

/// Google Cloud speech settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_speech_endpoint")]
    pub speech_endpoint: String,

    #[serde(default = "default_tts_endpoint")]
    pub tts_endpoint: String,

    #[serde(default = "default_language_code")]
    pub stt_language_code: String,

    #[serde(default = "default_language_code")]
    pub tts_language_code: String,

    #[serde(default = "default_voice_name")]
    pub tts_voice_name: String,

    #[serde(default = "default_sample_rate")]
    pub stt_sample_rate_hz: u32,

    #[serde(default = "default_tts_encoding")]
    pub tts_audio_encoding: String,

    #[serde(default = "default_true")]
    pub enable_automatic_punctuation: bool,

    #[serde(default = "default_request_timeout")]
    pub timeout_ms: u64,
}

fn default_speech_endpoint() -> String {
    endpoints::GOOGLE_SPEECH.to_string()
}

fn default_tts_endpoint() -> String {
    endpoints::GOOGLE_TTS.to_string()
}

fn default_language_code() -> String {
    speech::LANGUAGE_CODE.to_string()
}

fn default_voice_name() -> String {
    speech::TTS_VOICE_NAME.to_string()
}

fn default_sample_rate() -> u32 {
    speech::SAMPLE_RATE_HZ
}

fn default_tts_encoding() -> String {
    speech::TTS_AUDIO_ENCODING.to_string()
}

fn default_request_timeout() -> u64 {
    pipeline::RECOGNITION_TIMEOUT_MS
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            speech_endpoint: default_speech_endpoint(),
            tts_endpoint: default_tts_endpoint(),
            stt_language_code: default_language_code(),
            tts_language_code: default_language_code(),
            tts_voice_name: default_voice_name(),
            stt_sample_rate_hz: default_sample_rate(),
            tts_audio_encoding: default_tts_encoding(),
            enable_automatic_punctuation: true,
            timeout_ms: default_request_timeout(),
        }
    }
}

/// Self-hosted model server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfHostedConfig {
    #[serde(default = "default_self_hosted_url")]
    pub base_url: String,

    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default = "default_stt_filename")]
    pub stt_filename: String,

    #[serde(default = "default_stt_content_type")]
    pub stt_content_type: String,

    #[serde(default = "default_tts_chunk_size")]
    pub tts_chunk_size: usize,

    #[serde(default = "default_request_timeout")]
    pub timeout_ms: u64,
}

fn default_self_hosted_url() -> String {
    endpoints::SELF_HOSTED_DEFAULT.to_string()
}

fn default_stt_filename() -> String {
    speech::STT_FILENAME.to_string()
}

fn default_stt_content_type() -> String {
    speech::STT_CONTENT_TYPE.to_string()
}

fn default_tts_chunk_size() -> usize {
    speech::TTS_CHUNK_SIZE
}

impl Default for SelfHostedConfig {
    fn default() -> Self {
        Self {
            base_url: default_self_hosted_url(),
            auth_token: None,
            stt_filename: default_stt_filename(),
            stt_content_type: default_stt_content_type(),
            tts_chunk_size: default_tts_chunk_size(),
            timeout_ms: default_request_timeout(),
        }
    }
}

/// RAG configuration for retrieval and fusion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_qdrant_endpoint")]
    pub qdrant_endpoint: String,

    #[serde(default)]
    pub qdrant_api_key: Option<String>,

    #[serde(default = "default_collection")]
    pub qdrant_collection: String,

    /// On-disk Tantivy index; an empty in-RAM index is used when unset
    #[serde(default)]
    pub sparse_index_path: Option<String>,

    #[serde(default)]
    pub embedding_provider: ModelProvider,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_gemini_endpoint")]
    pub embedding_endpoint: String,

    #[serde(default)]
    pub embedding_api_key: Option<String>,

    /// Hits requested from each index
    #[serde(default = "default_retrieve_n")]
    pub retrieve_n: usize,

    /// Fused documents handed to generation
    #[serde(default = "default_fusion_top_m")]
    pub fusion_top_m: usize,

    /// RRF smoothing constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,

    #[serde(default = "default_dense_timeout")]
    pub dense_timeout_ms: u64,

    #[serde(default = "default_sparse_timeout")]
    pub sparse_timeout_ms: u64,

    /// Directory of `.txt` articles read by the ingestion tool
    #[serde(default = "default_kb_documents_path")]
    pub kb_documents_path: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_qdrant_endpoint() -> String {
    endpoints::QDRANT_DEFAULT.to_string()
}

fn default_collection() -> String {
    rag::COLLECTION.to_string()
}

fn default_embedding_model() -> String {
    rag::EMBEDDING_MODEL.to_string()
}

fn default_gemini_endpoint() -> String {
    endpoints::GEMINI.to_string()
}

fn default_retrieve_n() -> usize {
    rag::RETRIEVE_N
}

fn default_fusion_top_m() -> usize {
    rag::FUSION_TOP_M
}

fn default_rrf_k() -> f64 {
    rag::RRF_K
}

fn default_dense_timeout() -> u64 {
    rag::DENSE_TIMEOUT_MS
}

fn default_sparse_timeout() -> u64 {
    rag::SPARSE_TIMEOUT_MS
}

fn default_kb_documents_path() -> String {
    rag::KB_DOCUMENTS_PATH.to_string()
}

fn default_chunk_size() -> usize {
    rag::CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    rag::CHUNK_OVERLAP
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            qdrant_endpoint: default_qdrant_endpoint(),
            qdrant_api_key: None,
            qdrant_collection: default_collection(),
            sparse_index_path: None,
            embedding_provider: ModelProvider::default(),
            embedding_model: default_embedding_model(),
            embedding_endpoint: default_gemini_endpoint(),
            embedding_api_key: None,
            retrieve_n: default_retrieve_n(),
            fusion_top_m: default_fusion_top_m(),
            rrf_k: default_rrf_k(),
            dense_timeout_ms: default_dense_timeout(),
            sparse_timeout_ms: default_sparse_timeout(),
            kb_documents_path: default_kb_documents_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Generative model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default)]
    pub provider: ModelProvider,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_gemini_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
}

fn default_llm_model() -> String {
    llm::MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    512
}

fn default_llm_timeout() -> u64 {
    llm::TIMEOUT_MS
}

fn default_max_retries() -> u32 {
    llm::MAX_RETRIES
}

fn default_initial_backoff() -> u64 {
    llm::INITIAL_BACKOFF_MS
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default(),
            model: default_llm_model(),
            endpoint: default_gemini_endpoint(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_llm_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
        }
    }
}

/// Per-session pipeline sizing and timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// History entries kept per session
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    #[serde(default = "default_channel_capacity")]
    pub frame_channel_capacity: usize,

    #[serde(default = "default_channel_capacity")]
    pub transcript_channel_capacity: usize,

    #[serde(default = "default_channel_capacity")]
    pub fragment_channel_capacity: usize,

    #[serde(default = "default_audio_out_capacity")]
    pub audio_out_capacity: usize,

    #[serde(default = "default_recognition_timeout")]
    pub recognition_timeout_ms: u64,

    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_ms: u64,

    #[serde(default = "default_synthesis_timeout")]
    pub synthesis_timeout_ms: u64,

    #[serde(default = "default_utterance_gap")]
    pub utterance_gap_ms: u64,

    #[serde(default = "default_max_utterance_bytes")]
    pub max_utterance_bytes: usize,

    #[serde(default = "default_min_utterance_bytes")]
    pub min_utterance_bytes: usize,

    #[serde(default)]
    pub fragment_mode: FragmentMode,

    #[serde(default)]
    pub busy_audio_policy: BusyAudioPolicy,

    /// Spoken when the model call fails
    #[serde(default = "default_generation_failure_message")]
    pub generation_failure_message: String,
}

fn default_max_history() -> usize {
    pipeline::MAX_HISTORY
}

fn default_channel_capacity() -> usize {
    pipeline::CHANNEL_CAPACITY
}

fn default_audio_out_capacity() -> usize {
    pipeline::AUDIO_OUT_CAPACITY
}

fn default_recognition_timeout() -> u64 {
    pipeline::RECOGNITION_TIMEOUT_MS
}

fn default_generation_timeout() -> u64 {
    pipeline::GENERATION_TIMEOUT_MS
}

fn default_synthesis_timeout() -> u64 {
    pipeline::SYNTHESIS_TIMEOUT_MS
}

fn default_utterance_gap() -> u64 {
    pipeline::UTTERANCE_GAP_MS
}

fn default_max_utterance_bytes() -> usize {
    pipeline::MAX_UTTERANCE_BYTES
}

fn default_min_utterance_bytes() -> usize {
    pipeline::MIN_UTTERANCE_BYTES
}

fn default_generation_failure_message() -> String {
    pipeline::GENERATION_FAILURE_MESSAGE.to_string()
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            frame_channel_capacity: default_channel_capacity(),
            transcript_channel_capacity: default_channel_capacity(),
            fragment_channel_capacity: default_channel_capacity(),
            audio_out_capacity: default_audio_out_capacity(),
            recognition_timeout_ms: default_recognition_timeout(),
            generation_timeout_ms: default_generation_timeout(),
            synthesis_timeout_ms: default_synthesis_timeout(),
            utterance_gap_ms: default_utterance_gap(),
            max_utterance_bytes: default_max_utterance_bytes(),
            min_utterance_bytes: default_min_utterance_bytes(),
            fragment_mode: FragmentMode::default(),
            busy_audio_policy: BusyAudioPolicy::default(),
            generation_failure_message: default_generation_failure_message(),
        }
    }
}

/// External media engine and inbound audio format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Base URL of the media engine that answers SDP offers
    #[serde(default)]
    pub engine_url: Option<String>,

    #[serde(default)]
    pub inbound_encoding: AudioEncoding,

    #[serde(default = "default_sample_rate")]
    pub inbound_sample_rate_hz: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            engine_url: None,
            inbound_encoding: AudioEncoding::Linear16,
            inbound_sample_rate_hz: default_sample_rate(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from `config/` files, `VOICE_AGENT__` variables and the
/// flat deployment variables, then validate.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env, |key| std::env::var(key).ok())
}

/// Same as [`load_settings`] with an explicit config directory and variable lookup
pub fn load_settings_from<F>(
    config_dir: &Path,
    env: Option<&str>,
    lookup: F,
) -> Result<Settings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = Config::builder();

    builder = builder.add_source(File::from(config_dir.join("default")).required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(File::from(config_dir.join(env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOICE_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let mut settings: Settings = config.try_deserialize()?;

    settings.apply_env_overrides(lookup)?;
    settings.validate()?;

    Ok(settings)
}
