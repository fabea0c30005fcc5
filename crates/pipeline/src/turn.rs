//! One question/answer turn
//!
//! Runs the responder under the session's turn lock so two final transcripts
//! of the same session are never answered concurrently.

use std::sync::Arc;
use std::time::{Duration, Instant};

use voice_agent_config::PipelineSettings;
use voice_agent_core::{Error, Responder};
use voice_agent_text_processing::ResponseFilter;

use crate::metrics;
use crate::session::Session;

/// Result of one turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub query: String,
    /// Filtered text handed to synthesis
    pub spoken: String,
    pub source_ids: Vec<String>,
    /// Set when no answer could be produced; `spoken` then holds the
    /// configured failure message verbatim
    pub error: Option<Error>,
    pub latency: Duration,
}

impl TurnOutcome {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

pub struct TurnProcessor {
    responder: Arc<dyn Responder>,
    filter: ResponseFilter,
    generation_timeout: Duration,
    failure_message: String,
}

impl TurnProcessor {
    pub fn new(responder: Arc<dyn Responder>, settings: &PipelineSettings) -> Self {
        Self {
            responder,
            filter: ResponseFilter::new(),
            generation_timeout: Duration::from_millis(settings.generation_timeout_ms),
            failure_message: settings.generation_failure_message.clone(),
        }
    }

    pub fn with_filter(mut self, filter: ResponseFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Answer `query` in the context of `session`.
    ///
    /// Successful turns are appended to the history unfiltered. A failed or
    /// timed-out generation yields the failure message and leaves the
    /// history untouched.
    pub async fn process_query(&self, session: &Session, query: &str) -> TurnOutcome {
        let _turn = session.turn_lock().lock().await;
        session.touch();

        let started = Instant::now();
        let history = session.history();

        let result = match tokio::time::timeout(
            self.generation_timeout,
            self.responder.respond(query, &history),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                stage: "generation",
                ms: self.generation_timeout.as_millis() as u64,
            }),
        };
        let latency = started.elapsed();
        metrics::record_stage_latency("generation", latency);

        match result {
            Ok(answer) => {
                session.record_turn(query, &answer.text);
                let spoken = self.filter.filter(&answer.text);
                tracing::info!(
                    session_id = %session.id(),
                    sources = answer.source_ids.len(),
                    latency_ms = latency.as_millis() as u64,
                    "Turn answered"
                );
                TurnOutcome {
                    query: query.to_string(),
                    spoken,
                    source_ids: answer.source_ids,
                    error: None,
                    latency,
                }
            }
            Err(e) => {
                tracing::error!(
                    session_id = %session.id(),
                    error = %e,
                    latency_ms = latency.as_millis() as u64,
                    "Turn failed"
                );
                metrics::record_error(e.kind());
                TurnOutcome {
                    query: query.to_string(),
                    spoken: self.failure_message.clone(),
                    source_ids: Vec::new(),
                    error: Some(e),
                    latency,
                }
            }
        }
    }
}
