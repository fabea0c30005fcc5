//! WebSocket Handler
//!
//! One socket is one live call:
//! - text `{"type":"offer","sdp"}` is negotiated through the media engine and
//!   answered with `{"type":"answer","sdp"}`
//! - inbound binary frames are caller audio
//! - outbound binary frames are synthesized audio chunks
//! - outbound text frames are pipeline events
//!
//! Closing the socket tears the session down and unregisters it.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use voice_agent_core::{AudioChunk, AudioFrame};
use voice_agent_pipeline::{PipelineEvent, Session};

use crate::state::AppState;
use crate::ServerError;

const CONTROL_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Deserialize)]
pub struct SessionParams {
    pub session_id: Option<String>,
}

/// Text messages from the client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Offer { sdp: String },
}

/// Text messages to the client that are not pipeline events
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlMessage {
    Session { session_id: String },
    Answer { sdp: String },
    Error { kind: &'static str, message: String },
}

impl ControlMessage {
    fn into_message(self) -> Option<Message> {
        serde_json::to_string(&self).ok().map(Message::Text)
    }
}

/// `GET /ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<SessionParams>,
) -> Result<Response, ServerError> {
    let session = state.sessions.get_or_create(params.session_id.as_deref())?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, session, state)))
}

async fn handle_socket(socket: WebSocket, session: Arc<Session>, state: AppState) {
    let session_id = session.id().to_string();
    let pipeline_settings = &state.config.pipeline;
    let (sender, mut receiver) = socket.split();

    let (audio_in_tx, audio_in_rx) = mpsc::channel(pipeline_settings.frame_channel_capacity.max(1));
    let (audio_out_tx, audio_out_rx) = mpsc::channel(pipeline_settings.audio_out_capacity.max(1));
    let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);

    let orchestrator = state.orchestrator(session.clone());
    let events = orchestrator.subscribe();
    let mut pipeline = tokio::spawn(async move { orchestrator.run(audio_in_rx, audio_out_tx).await });
    let writer = tokio::spawn(write_outbound(sender, audio_out_rx, events, control_rx));

    tracing::info!(session_id = %session_id, "WebSocket connected");
    if let Some(msg) = (ControlMessage::Session {
        session_id: session_id.clone(),
    })
    .into_message()
    {
        let _ = control_tx.send(msg).await;
    }

    let cancel = session.cancellation_token();
    let media = &state.config.media;
    let mut sequence = 0u64;
    let mut finished = None;

    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            result = &mut pipeline => {
                finished = Some(result);
                break;
            }
            msg = receiver.next() => msg,
        };

        match msg {
            Some(Ok(Message::Binary(data))) => {
                session.touch();
                let frame = AudioFrame::new(data, media.inbound_encoding, media.inbound_sample_rate_hz, sequence);
                sequence += 1;
                if audio_in_tx.send(frame).await.is_err() {
                    break;
                }
            },
            Some(Ok(Message::Text(text))) => {
                let reply = handle_text(&state, &session_id, &text).await;
                if let Some(msg) = reply.into_message() {
                    if control_tx.send(msg).await.is_err() {
                        break;
                    }
                }
            },
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {},
            Some(Err(e)) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive failed");
                break;
            },
        }
    }

    // Closing the inbound side ends the pipeline, which in turn closes the writer
    drop(audio_in_tx);
    drop(control_tx);

    let result = match finished {
        Some(result) => result,
        None => pipeline.await,
    };
    match result {
        Ok(Ok(())) => {},
        Ok(Err(e)) => tracing::warn!(session_id = %session_id, error = %e, "Pipeline ended with error"),
        Err(e) => tracing::error!(session_id = %session_id, error = %e, "Pipeline task failed"),
    }
    let _ = writer.await;

    state.sessions.remove(&session_id);
    tracing::info!(session_id = %session_id, "WebSocket disconnected");
}

async fn handle_text(state: &AppState, session_id: &str, text: &str) -> ControlMessage {
    let offer = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Offer { sdp }) => sdp,
        Err(e) => {
            return ControlMessage::Error {
                kind: "invalid_request",
                message: format!("unsupported message: {}", e),
            }
        },
    };

    let Some(engine) = &state.media else {
        return ControlMessage::Error {
            kind: "media",
            message: "no media engine configured".to_string(),
        };
    };

    match engine.negotiate(session_id, &offer).await {
        Ok(sdp) => ControlMessage::Answer { sdp },
        Err(e) => {
            tracing::warn!(session_id, error = %e, "SDP negotiation failed");
            ControlMessage::Error {
                kind: "media",
                message: e.to_string(),
            }
        },
    }
}

/// Forward audio, events and control replies to the socket until the
/// pipeline is gone or the client stops accepting.
async fn write_outbound(
    mut sender: futures::stream::SplitSink<WebSocket, Message>,
    mut audio_out: mpsc::Receiver<AudioChunk>,
    mut events: broadcast::Receiver<PipelineEvent>,
    mut control: mpsc::Receiver<Message>,
) {
    let mut events_open = true;

    loop {
        let msg = tokio::select! {
            biased;

            Some(msg) = control.recv() => Some(msg),
            chunk = audio_out.recv() => match chunk {
                // Turn boundaries are signalled by the turn_complete event
                Some(chunk) if chunk.end_of_stream => None,
                Some(chunk) => Some(Message::Binary(chunk.data)),
                None => break,
            },
            event = events.recv(), if events_open => match event {
                Ok(event) => serde_json::to_string(&event).ok().map(Message::Text),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "WebSocket client lagging, events skipped");
                    None
                },
                Err(broadcast::error::RecvError::Closed) => {
                    events_open = false;
                    None
                },
            },
        };

        if let Some(msg) = msg {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}
