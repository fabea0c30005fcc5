//! Backend selection from settings

use std::sync::Arc;

use voice_agent_config::{LlmSettings, ModelProvider};

use crate::backend::{LlmBackend, LlmConfig, OllamaBackend};
use crate::gemini::GeminiBackend;
use crate::LlmError;

/// Build the configured generative backend
pub fn create_backend(settings: &LlmSettings) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let config = LlmConfig::from(settings);

    tracing::info!(
        provider = ?settings.provider,
        model = %config.model,
        endpoint = %config.endpoint,
        "Creating LLM backend"
    );

    match settings.provider {
        ModelProvider::Gemini => Ok(Arc::new(GeminiBackend::new(config)?)),
        ModelProvider::Ollama => Ok(Arc::new(OllamaBackend::new(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama() {
        let settings = LlmSettings {
            provider: ModelProvider::Ollama,
            model: "llama3".to_string(),
            endpoint: "http://localhost:11434/".to_string(),
            ..LlmSettings::default()
        };
        let backend = create_backend(&settings).unwrap();
        assert_eq!(backend.model_name(), "llama3");
    }

    #[test]
    fn test_gemini_without_key_fails() {
        let settings = LlmSettings {
            api_key: None,
            ..LlmSettings::default()
        };
        assert!(matches!(
            create_backend(&settings),
            Err(LlmError::Configuration(_))
        ));
    }
}
