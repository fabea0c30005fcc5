//! Centralized constants for the voice agent
//!
//! Default endpoints, model names and sizes live here so the settings
//! defaults and the backends agree on them.

/// Service endpoints
pub mod endpoints {
    /// Self-hosted model server (`/stt`, `/tts`)
    pub const SELF_HOSTED_DEFAULT: &str = "http://localhost:8081";

    pub const GOOGLE_SPEECH: &str = "https://speech.googleapis.com/v1";

    pub const GOOGLE_TTS: &str = "https://texttospeech.googleapis.com/v1";

    pub const GEMINI: &str = "https://generativelanguage.googleapis.com/v1beta";

    pub const OLLAMA_DEFAULT: &str = "http://localhost:11434";

    pub const QDRANT_DEFAULT: &str = "http://127.0.0.1:6334";
}

/// Speech settings
pub mod speech {
    pub const LANGUAGE_CODE: &str = "en-US";

    pub const TTS_VOICE_NAME: &str = "en-US-Standard-J";

    pub const TTS_AUDIO_ENCODING: &str = "MP3";

    /// Inbound caller audio rate
    pub const SAMPLE_RATE_HZ: u32 = 48_000;

    /// Byte size of re-chunked self-hosted synthesis output
    pub const TTS_CHUNK_SIZE: usize = 1024;

    pub const STT_FILENAME: &str = "audio.webm";

    pub const STT_CONTENT_TYPE: &str = "audio/webm";
}

/// Retrieval and fusion
pub mod rag {
    pub const COLLECTION: &str = "telecom_kb";

    pub const EMBEDDING_MODEL: &str = "models/text-embedding-004";

    /// Hits requested from each index per query
    pub const RETRIEVE_N: usize = 10;

    /// Fused documents passed to generation
    pub const FUSION_TOP_M: usize = 5;

    /// RRF smoothing constant
    pub const RRF_K: f64 = 20.0;

    pub const DENSE_TIMEOUT_MS: u64 = 2_000;

    pub const SPARSE_TIMEOUT_MS: u64 = 1_000;

    pub const KB_DOCUMENTS_PATH: &str = "knowledge_base/documents";

    /// Words per ingested chunk
    pub const CHUNK_SIZE: usize = 768;

    /// Words shared by consecutive chunks
    pub const CHUNK_OVERLAP: usize = 100;

    /// Spoken when the model returns nothing usable
    pub const INSUFFICIENT_INFORMATION_ANSWER: &str = "I'm sorry, I don't have enough information to answer that. Is there anything else I can help you with?";
}

/// Generative model
pub mod llm {
    pub const MODEL: &str = "gemini-1.5-flash";

    pub const TIMEOUT_MS: u64 = 20_000;

    pub const MAX_RETRIES: u32 = 3;

    pub const INITIAL_BACKOFF_MS: u64 = 100;
}

/// Pipeline sizing
pub mod pipeline {
    /// Entries kept in session history (user and agent lines each count)
    pub const MAX_HISTORY: usize = 10;

    pub const CHANNEL_CAPACITY: usize = 64;

    pub const AUDIO_OUT_CAPACITY: usize = 32;

    pub const RECOGNITION_TIMEOUT_MS: u64 = 15_000;

    pub const GENERATION_TIMEOUT_MS: u64 = 30_000;

    pub const SYNTHESIS_TIMEOUT_MS: u64 = 15_000;

    /// Silence gap that closes a buffered unit of audio
    pub const UTTERANCE_GAP_MS: u64 = 700;

    pub const MAX_UTTERANCE_BYTES: usize = 48_000 * 2 * 15;

    pub const MIN_UTTERANCE_BYTES: usize = 3_200;

    pub const GENERATION_FAILURE_MESSAGE: &str =
        "I'm sorry, I couldn't put together an answer just now. Please try asking again.";
}

/// Session registry
pub mod sessions {
    pub const MAX_SESSIONS: usize = 100;

    pub const IDLE_TIMEOUT_SECS: u64 = 1_800;

    pub const CLEANUP_INTERVAL_SECS: u64 = 60;
}
