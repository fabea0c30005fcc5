//! Text streaming endpoint
//!
//! `POST /stream` takes newline-delimited `{"text","is_final"}` transcript
//! lines and answers each completed utterance with newline-delimited
//! `{"text_chunk":"word "}` lines. The session id is echoed in the
//! `x-session-id` response header.

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use voice_agent_config::FragmentMode;
use voice_agent_core::TranscriptBuffer;
use voice_agent_pipeline::{
    encode_line, metrics, split_fragments, NdjsonDecoder, PipelineState, Session, TextChunkLine,
    TurnProcessor,
};

use crate::state::AppState;
use crate::websocket::SessionParams;
use crate::ServerError;

pub const SESSION_ID_HEADER: &str = "x-session-id";

pub type ChunkSender = mpsc::Sender<Result<String, Infallible>>;

/// `POST /stream`
pub async fn stream_handler(
    State(state): State<AppState>,
    Query(params): Query<SessionParams>,
    body: Body,
) -> Result<Response, ServerError> {
    let session = state.sessions.get_or_create(params.session_id.as_deref())?;
    // A caller-named session outlives the request so history carries over
    let ephemeral = params.session_id.is_none();
    let session_id = session.id().to_string();
    let header_value = HeaderValue::from_str(&session_id)
        .map_err(|_| ServerError::InvalidRequest("session_id is not a valid header value".to_string()))?;

    let (tx, rx) = mpsc::channel(state.config.pipeline.fragment_channel_capacity.max(1));
    let turns = state.turns.clone();
    let sessions = state.sessions.clone();

    tokio::spawn(async move {
        drive_text_turns(&turns, &session, body.into_data_stream(), tx).await;
        if ephemeral {
            sessions.remove(&session_id);
        } else {
            session.transition_if(PipelineState::Listening, PipelineState::Idle);
        }
    });

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/x-ndjson")),
            (HeaderName::from_static(SESSION_ID_HEADER), header_value),
        ],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response())
}

/// Feed request bytes through the transcript buffer and answer every
/// completed query, one turn at a time.
///
/// Stops when the input ends, the response is dropped, or the session is
/// closed.
pub async fn drive_text_turns<S, E>(
    turns: &TurnProcessor,
    session: &Session,
    input: S,
    tx: ChunkSender,
) where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let cancel = session.cancellation_token();
    let mut input = std::pin::pin!(input);
    let mut decoder = NdjsonDecoder::new();
    let mut buffer = TranscriptBuffer::new();
    let mut sequence = 0u64;

    loop {
        let next = tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            _ = tx.closed() => break,
            next = input.next() => next,
        };

        let (lines, done) = match next {
            Some(Ok(bytes)) => (decoder.push(&bytes), false),
            Some(Err(e)) => {
                tracing::debug!(session_id = %session.id(), error = %e, "Request body ended with error");
                (decoder.finish().into_iter().collect(), true)
            },
            None => (decoder.finish().into_iter().collect(), true),
        };

        for line in lines {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(session_id = %session.id(), error = %e, "Skipping malformed transcript line");
                    continue;
                },
            };
            session.transition_if(PipelineState::Idle, PipelineState::Listening);
            session.touch();

            let event = line.into_event(sequence);
            sequence += 1;
            if let Some(query) = buffer.push(&event) {
                if !answer(turns, session, &query, &tx).await {
                    return;
                }
            }
        }

        if done {
            break;
        }
    }
}

/// Run one turn and stream its words. Returns false once the client is gone
/// or the session is closed.
async fn answer(turns: &TurnProcessor, session: &Session, query: &str, tx: &ChunkSender) -> bool {
    let cancel = session.cancellation_token();
    session.set_state(PipelineState::Thinking);

    let outcome = tokio::select! {
        biased;

        _ = cancel.cancelled() => return false,
        _ = tx.closed() => {
            tracing::debug!(session_id = %session.id(), "Client went away mid-turn");
            session.transition_if(PipelineState::Thinking, PipelineState::Idle);
            return false;
        },
        outcome = turns.process_query(session, query) => outcome,
    };
    metrics::record_turn(if outcome.failed() { "failed" } else { "answered" });

    session.set_state(PipelineState::Speaking);
    let mut delivered = true;
    for word in split_fragments(&outcome.spoken, FragmentMode::Words) {
        let line = match encode_line(&TextChunkLine { text_chunk: word }) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode text chunk");
                continue;
            },
        };
        if tx.send(Ok(line)).await.is_err() {
            delivered = false;
            break;
        }
    }
    session.transition_if(PipelineState::Speaking, PipelineState::Idle);
    delivered
}
