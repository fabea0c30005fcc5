//! Text-to-speech backends
//!
//! One synthesis call per text fragment, fragments are never merged. Chunk
//! order always follows fragment order, but a fragment may produce any
//! number of chunks.

mod cloud;
mod self_hosted;

pub use cloud::{CloudSynthesizer, CloudTtsConfig};
pub use self_hosted::{Rechunker, SelfHostedSynthesizer, SelfHostedTtsConfig};

use std::sync::Arc;

use voice_agent_config::{ProviderKind, Settings};
use voice_agent_core::SpeechSynthesizer;

use crate::PipelineError;

/// Build the synthesizer selected by `providers.tts`
pub fn create_synthesizer(settings: &Settings) -> Result<Arc<dyn SpeechSynthesizer>, PipelineError> {
    let synthesizer: Arc<dyn SpeechSynthesizer> = match settings.providers.tts {
        ProviderKind::Google => Arc::new(CloudSynthesizer::new(CloudTtsConfig::from(&settings.google))?),
        ProviderKind::SelfHosted => Arc::new(SelfHostedSynthesizer::new(
            SelfHostedTtsConfig::from(&settings.self_hosted),
        )?),
    };
    tracing::info!(provider = synthesizer.provider_name(), "Speech synthesizer ready");
    Ok(synthesizer)
}
