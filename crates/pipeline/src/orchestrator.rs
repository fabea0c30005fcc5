//! Voice Pipeline Orchestrator
//!
//! Runs one session end to end: caller audio in, synthesized audio out.
//!
//! Three stages connected by bounded channels:
//! - gate: inbound frames, `Idle -> Listening`, drops audio while busy
//! - recognition: frames to transcript events, restarted after failures
//! - turn: final transcripts to answers, answers to synthesized chunks
//!
//! Every stage runs under a child of the session's cancellation token.

use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use voice_agent_config::{BusyAudioPolicy, FragmentMode, PipelineSettings};
use voice_agent_core::{
    AudioChunk, AudioFrame, Error, SpeechRecognizer, SpeechSynthesizer, TranscriptBuffer,
    TranscriptEvent,
};

use crate::fragments::split_fragments;
use crate::metrics;
use crate::session::{PipelineState, Session};
use crate::turn::TurnProcessor;
use crate::PipelineError;

/// Pipeline events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    #[serde(rename = "state")]
    StateChanged {
        from: PipelineState,
        to: PipelineState,
    },
    Transcript {
        text: String,
        is_final: bool,
    },
    /// Filtered answer about to be spoken
    Response {
        text: String,
        source_ids: Vec<String>,
    },
    /// Frames dropped during one busy period
    AudioDropped { count: u64 },
    TurnComplete { failed: bool },
    Error { kind: String, message: String },
}

impl PipelineEvent {
    fn error(err: &Error) -> Self {
        PipelineEvent::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Channel sizes and stage behaviour
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub frame_capacity: usize,
    pub transcript_capacity: usize,
    pub fragment_capacity: usize,
    /// Bound on waiting for the next synthesized chunk
    pub synthesis_timeout: Duration,
    pub fragment_mode: FragmentMode,
    pub busy_audio_policy: BusyAudioPolicy,
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&PipelineSettings::default())
    }
}

impl From<&PipelineSettings> for OrchestratorConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            frame_capacity: settings.frame_channel_capacity,
            transcript_capacity: settings.transcript_channel_capacity,
            fragment_capacity: settings.fragment_channel_capacity,
            synthesis_timeout: Duration::from_millis(settings.synthesis_timeout_ms),
            fragment_mode: settings.fragment_mode,
            busy_audio_policy: settings.busy_audio_policy,
            event_capacity: 256,
        }
    }
}

/// State shared by the stages of one run
#[derive(Clone)]
struct StageContext {
    session: Arc<Session>,
    events: broadcast::Sender<PipelineEvent>,
}

impl StageContext {
    fn transition(&self, to: PipelineState) {
        if let Some(from) = self.session.set_state(to) {
            self.emit(PipelineEvent::StateChanged { from, to });
        }
    }

    fn transition_if(&self, from: PipelineState, to: PipelineState) {
        if self.session.transition_if(from, to) {
            self.emit(PipelineEvent::StateChanged { from, to });
        }
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

pub struct PipelineOrchestrator {
    session: Arc<Session>,
    recognizer: Arc<dyn SpeechRecognizer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    turns: Arc<TurnProcessor>,
    config: OrchestratorConfig,
    events: broadcast::Sender<PipelineEvent>,
}

impl PipelineOrchestrator {
    pub fn new(
        session: Arc<Session>,
        recognizer: Arc<dyn SpeechRecognizer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        turns: Arc<TurnProcessor>,
        config: OrchestratorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            session,
            recognizer,
            synthesizer,
            turns,
            config,
            events,
        }
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Drive the session until the connection goes away.
    ///
    /// Returns when `audio_in` is closed, the receiver of `audio_out` is
    /// dropped, or the session token is cancelled. The session ends in
    /// `Closed` either way.
    pub async fn run(
        &self,
        audio_in: mpsc::Receiver<AudioFrame>,
        audio_out: mpsc::Sender<AudioChunk>,
    ) -> Result<(), PipelineError> {
        let ctx = StageContext {
            session: self.session.clone(),
            events: self.events.clone(),
        };
        let run_token = self.session.cancellation_token().child_token();

        let (frames_tx, frames_rx) = mpsc::channel(self.config.frame_capacity.max(1));
        let (transcripts_tx, transcripts_rx) = mpsc::channel(self.config.transcript_capacity.max(1));
        let out_watch = audio_out.clone();

        tracing::info!(
            session_id = %self.session.id(),
            stt = self.recognizer.provider_name(),
            tts = self.synthesizer.provider_name(),
            "Pipeline started"
        );

        let gate = tokio::spawn(gate_stage(
            ctx.clone(),
            audio_in,
            frames_tx,
            self.config.busy_audio_policy,
            run_token.clone(),
        ));
        let recognition = tokio::spawn(recognition_stage(
            ctx.clone(),
            self.recognizer.clone(),
            frames_rx,
            transcripts_tx,
            run_token.child_token(),
        ));
        let turn = tokio::spawn(turn_stage(
            ctx.clone(),
            TurnStage {
                turns: self.turns.clone(),
                synthesizer: self.synthesizer.clone(),
                config: self.config.clone(),
            },
            transcripts_rx,
            audio_out,
            run_token.clone(),
        ));

        tokio::select! {
            _ = run_token.cancelled() => {}
            _ = out_watch.closed() => run_token.cancel(),
        }
        drop(out_watch);

        for (name, handle) in [("gate", gate), ("recognition", recognition), ("turn", turn)] {
            if let Err(e) = handle.await {
                tracing::error!(session_id = %self.session.id(), stage = name, error = %e, "Pipeline stage aborted");
            }
        }

        ctx.transition(PipelineState::Closed);
        tracing::info!(session_id = %self.session.id(), "Pipeline stopped");
        Ok(())
    }
}

/// Forward caller audio unless a turn is in progress.
///
/// Ending here (audio source gone) tears the whole run down.
async fn gate_stage(
    ctx: StageContext,
    mut audio_in: mpsc::Receiver<AudioFrame>,
    frames_tx: mpsc::Sender<AudioFrame>,
    policy: BusyAudioPolicy,
    run_token: CancellationToken,
) {
    let cancel = run_token.child_token();
    let mut dropped: u64 = 0;

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = audio_in.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        ctx.session.touch();

        let state = ctx.session.state();
        if state.is_busy() {
            match policy {
                BusyAudioPolicy::Drop => {
                    dropped += 1;
                    tracing::debug!(
                        session_id = %ctx.session.id(),
                        sequence = frame.sequence,
                        %state,
                        "Dropping caller audio while busy"
                    );
                }
            }
            continue;
        }
        if dropped > 0 {
            metrics::record_dropped_frames(dropped);
            ctx.emit(PipelineEvent::AudioDropped { count: dropped });
            dropped = 0;
        }

        match state {
            PipelineState::Closed => break,
            PipelineState::Idle => ctx.transition(PipelineState::Listening),
            _ => {}
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = frames_tx.send(frame) => if sent.is_err() { break },
        }
    }

    if dropped > 0 {
        metrics::record_dropped_frames(dropped);
        ctx.emit(PipelineEvent::AudioDropped { count: dropped });
    }
    run_token.cancel();
}

/// Feed frames to the recognizer, restarting it after each failure
async fn recognition_stage(
    ctx: StageContext,
    recognizer: Arc<dyn SpeechRecognizer>,
    mut frames_rx: mpsc::Receiver<AudioFrame>,
    transcripts_tx: mpsc::Sender<TranscriptEvent>,
    cancel: CancellationToken,
) {
    let mut sequence = 0u64;

    loop {
        let failed = {
            let frames = Box::pin(futures::stream::poll_fn(|cx| frames_rx.poll_recv(cx)));
            let mut transcripts = recognizer.recognize(frames);
            let mut failed = false;

            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => return,
                    next = transcripts.next() => next,
                };
                match next {
                    Some(Ok(mut event)) => {
                        // Renumber so sequences stay monotonic across restarts
                        event.sequence = sequence;
                        sequence += 1;
                        ctx.emit(PipelineEvent::Transcript {
                            text: event.text.clone(),
                            is_final: event.is_final,
                        });
                        tokio::select! {
                            _ = cancel.cancelled() => return,
                            sent = transcripts_tx.send(event) => if sent.is_err() { return },
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(
                            session_id = %ctx.session.id(),
                            provider = recognizer.provider_name(),
                            error = %e,
                            "Recognition failed, restarting"
                        );
                        metrics::record_error(e.kind());
                        ctx.emit(PipelineEvent::error(&e));
                        ctx.transition_if(PipelineState::Listening, PipelineState::Idle);
                        failed = true;
                        break;
                    }
                    None => break,
                }
            }
            failed
        };

        // A clean end means the frame channel closed
        if !failed || cancel.is_cancelled() {
            break;
        }
    }
}

struct TurnStage {
    turns: Arc<TurnProcessor>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    config: OrchestratorConfig,
}

enum Spoken {
    Done,
    Failed,
    /// Output gone or run cancelled
    Closed,
}

/// Answer final transcripts one at a time and speak the answers
async fn turn_stage(
    ctx: StageContext,
    stage: TurnStage,
    mut transcripts_rx: mpsc::Receiver<TranscriptEvent>,
    audio_out: mpsc::Sender<AudioChunk>,
    run_token: CancellationToken,
) {
    let cancel = run_token.child_token();
    let mut buffer = TranscriptBuffer::new();
    let mut chunk_sequence = 0u64;

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = transcripts_rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        ctx.transition_if(PipelineState::Idle, PipelineState::Listening);
        let Some(query) = buffer.push(&event) else {
            continue;
        };

        let started = Instant::now();
        ctx.transition(PipelineState::Thinking);

        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = stage.turns.process_query(&ctx.session, &query) => outcome,
        };
        match &outcome.error {
            Some(e) => ctx.emit(PipelineEvent::error(e)),
            None => ctx.emit(PipelineEvent::Response {
                text: outcome.spoken.clone(),
                source_ids: outcome.source_ids.clone(),
            }),
        }

        ctx.transition(PipelineState::Speaking);
        let spoken = speak(
            &ctx,
            &stage,
            &outcome.spoken,
            &audio_out,
            &mut chunk_sequence,
            &cancel,
        )
        .await;
        if let Spoken::Closed = spoken {
            break;
        }

        ctx.transition(PipelineState::Idle);
        let failed = outcome.failed() || matches!(spoken, Spoken::Failed);
        metrics::record_turn(if failed { "failed" } else { "answered" });
        metrics::record_stage_latency("turn", started.elapsed());
        ctx.emit(PipelineEvent::TurnComplete { failed });
    }

    run_token.cancel();
}

/// Push `text` through the synthesizer into `audio_out`, then the end marker
async fn speak(
    ctx: &StageContext,
    stage: &TurnStage,
    text: &str,
    audio_out: &mpsc::Sender<AudioChunk>,
    sequence: &mut u64,
    cancel: &CancellationToken,
) -> Spoken {
    let fragments = split_fragments(text, stage.config.fragment_mode);
    let (fragment_tx, fragment_rx) = mpsc::channel::<String>(stage.config.fragment_capacity.max(1));
    let started = Instant::now();

    let produce = async move {
        for fragment in fragments {
            if fragment_tx.send(fragment).await.is_err() {
                break;
            }
        }
    };

    let consume = async {
        let mut chunks = stage
            .synthesizer
            .synthesize(Box::pin(ReceiverStream::new(fragment_rx)));

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Spoken::Closed,
                next = tokio::time::timeout(stage.config.synthesis_timeout, chunks.next()) => next,
            };
            let chunk = match next {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(None) => return Spoken::Done,
                Ok(Some(Err(e))) => {
                    report_synthesis_failure(ctx, stage, &e);
                    return Spoken::Failed;
                }
                Err(_) => {
                    let e = Error::Timeout {
                        stage: "synthesis",
                        ms: stage.config.synthesis_timeout.as_millis() as u64,
                    };
                    report_synthesis_failure(ctx, stage, &e);
                    return Spoken::Failed;
                }
            };
            if chunk.data.is_empty() {
                continue;
            }

            let out = AudioChunk::new(chunk.data, *sequence);
            *sequence += 1;
            tokio::select! {
                _ = cancel.cancelled() => return Spoken::Closed,
                sent = audio_out.send(out) => if sent.is_err() { return Spoken::Closed },
            }
        }
    };

    let ((), spoken) = tokio::join!(produce, consume);
    if let Spoken::Closed = spoken {
        return spoken;
    }
    metrics::record_stage_latency("synthesis", started.elapsed());

    let marker = AudioChunk::end_marker(*sequence);
    *sequence += 1;
    tokio::select! {
        _ = cancel.cancelled() => Spoken::Closed,
        sent = audio_out.send(marker) => if sent.is_err() { Spoken::Closed } else { spoken },
    }
}

fn report_synthesis_failure(ctx: &StageContext, stage: &TurnStage, err: &Error) {
    tracing::warn!(
        session_id = %ctx.session.id(),
        provider = stage.synthesizer.provider_name(),
        error = %err,
        "Synthesis failed, answer not vocalised"
    );
    metrics::record_error(err.kind());
    ctx.emit(PipelineEvent::error(err));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = PipelineEvent::StateChanged {
            from: PipelineState::Idle,
            to: PipelineState::Listening,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({ "type": "state", "from": "idle", "to": "listening" })
        );

        let event = PipelineEvent::Transcript {
            text: "hello".to_string(),
            is_final: true,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({ "type": "transcript", "text": "hello", "is_final": true })
        );
    }

    #[test]
    fn test_config_from_settings() {
        let settings = PipelineSettings {
            fragment_channel_capacity: 3,
            synthesis_timeout_ms: 250,
            ..Default::default()
        };
        let config = OrchestratorConfig::from(&settings);
        assert_eq!(config.fragment_capacity, 3);
        assert_eq!(config.synthesis_timeout, Duration::from_millis(250));
    }
}
