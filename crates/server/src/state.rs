//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;

use voice_agent_config::Settings;
use voice_agent_core::{Responder, SpeechRecognizer, SpeechSynthesizer};
use voice_agent_pipeline::{OrchestratorConfig, PipelineOrchestrator, Session, TurnProcessor};

use crate::media::MediaEngine;
use crate::session::SessionManager;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub sessions: Arc<SessionManager>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub turns: Arc<TurnProcessor>,
    /// SDP negotiation; `None` when no media engine is configured
    pub media: Option<Arc<dyn MediaEngine>>,
}

impl AppState {
    pub fn new(
        config: Settings,
        recognizer: Arc<dyn SpeechRecognizer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        let turns = Arc::new(TurnProcessor::new(responder, &config.pipeline));
        Self {
            sessions: Arc::new(SessionManager::new(&config)),
            config: Arc::new(config),
            recognizer,
            synthesizer,
            turns,
            media: None,
        }
    }

    pub fn with_media_engine(mut self, media: Arc<dyn MediaEngine>) -> Self {
        self.media = Some(media);
        self
    }

    /// Orchestrator for one live audio connection
    pub fn orchestrator(&self, session: Arc<Session>) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            session,
            self.recognizer.clone(),
            self.synthesizer.clone(),
            self.turns.clone(),
            OrchestratorConfig::from(&self.config.pipeline),
        )
    }
}
