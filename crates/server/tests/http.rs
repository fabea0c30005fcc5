//! Router tests: auth, session API and the NDJSON stream endpoint.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use voice_agent_config::Settings;
use voice_agent_core::{
    AnswerResult, AudioChunk, AudioChunkStream, AudioFrameStream, HistoryEntry, Responder, Result,
    SpeechRecognizer, SpeechSynthesizer, TextFragmentStream, TranscriptEvent, TranscriptStream,
};
use voice_agent_pipeline::PipelineState;
use voice_agent_server::{create_router, AppState};

const TOKEN: &str = "shared-secret";

struct SilentRecognizer;

#[async_trait]
impl SpeechRecognizer for SilentRecognizer {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        Ok(String::new())
    }

    fn recognize<'a>(&'a self, audio: AudioFrameStream<'a>) -> TranscriptStream<'a> {
        Box::pin(audio.filter_map(|_| async { None::<Result<TranscriptEvent>> }))
    }

    fn provider_name(&self) -> &str {
        "stub-stt"
    }
}

struct NullSynthesizer;

#[async_trait]
impl SpeechSynthesizer for NullSynthesizer {
    async fn synthesize_text(&self, _text: &str) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn synthesize<'a>(&'a self, fragments: TextFragmentStream<'a>) -> AudioChunkStream<'a> {
        Box::pin(
            fragments
                .enumerate()
                .map(|(i, text)| Ok(AudioChunk::new(text.into_bytes(), i as u64))),
        )
    }

    fn provider_name(&self) -> &str {
        "stub-tts"
    }
}

struct PlanResponder;

#[async_trait]
impl Responder for PlanResponder {
    async fn respond(&self, query: &str, history: &[HistoryEntry]) -> Result<AnswerResult> {
        Ok(AnswerResult {
            text: format!("Turn {} about {}", history.len() / 2 + 1, query),
            source_ids: vec!["plans_chunk_0".to_string()],
        })
    }
}

fn app_state(auth: bool, max_sessions: usize) -> AppState {
    let mut settings = Settings::default();
    settings.server.auth.enabled = auth;
    settings.server.auth.token = Some(TOKEN.to_string());
    settings.server.max_sessions = max_sessions;
    AppState::new(
        settings,
        Arc::new(SilentRecognizer),
        Arc::new(NullSynthesizer),
        Arc::new(PlanResponder),
    )
}

fn request(method: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
        .body(body)
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

fn spoken(ndjson: &str) -> String {
    ndjson
        .lines()
        .map(|line| {
            let value: Value = serde_json::from_str(line).unwrap();
            value["text_chunk"].as_str().unwrap().to_string()
        })
        .collect()
}

#[tokio::test]
async fn test_health_is_public() {
    let app = create_router(app_state(true, 10));
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["status"], "healthy");
}

#[tokio::test]
async fn test_missing_or_wrong_token_is_rejected() {
    let app = create_router(app_state(true, 10));

    let req = Request::builder().uri("/api/sessions").body(Body::empty()).unwrap();
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), serde_json::json!({ "error": "Unauthorized" }));

    let req = Request::builder()
        .uri("/stream")
        .method("POST")
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::from("{\"text\":\"hi\"}\n"))
        .unwrap();
    let (status, _, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(&app, request("GET", "/api/sessions", Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_ready_reports_providers() {
    let app = create_router(app_state(false, 10));
    let (status, _, body) = send(&app, request("GET", "/ready", Body::empty())).await;

    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["stt_provider"], "stub-stt");
    assert_eq!(value["tts_provider"], "stub-tts");
    assert_eq!(value["sessions"], 0);
}

#[tokio::test]
async fn test_stream_answers_each_final_line() {
    let state = app_state(false, 10);
    let app = create_router(state.clone());
    let input = "{\"text\":\"billing \",\"is_final\":false}\n{\"text\":\"question\",\"is_final\":true}\n";

    let (status, headers, body) = send(&app, request("POST", "/stream", Body::from(input))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/x-ndjson");
    assert!(headers.contains_key("x-session-id"));
    assert_eq!(spoken(&body), "Turn 1 about billing question ");
}

#[tokio::test]
async fn test_named_session_keeps_history_across_requests() {
    let state = app_state(false, 10);
    let app = create_router(state.clone());

    let (_, headers, body) = send(
        &app,
        request("POST", "/stream?session_id=caller-7", Body::from("{\"text\":\"roaming\"}\n")),
    )
    .await;
    assert_eq!(headers["x-session-id"], "caller-7");
    assert_eq!(spoken(&body), "Turn 1 about roaming ");

    let (_, _, body) = send(
        &app,
        request("POST", "/stream?session_id=caller-7", Body::from("{\"text\":\"data caps\"}\n")),
    )
    .await;
    assert_eq!(spoken(&body), "Turn 2 about data caps ");

    let (status, _, body) = send(&app, request("GET", "/api/sessions/caller-7", Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    let info: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(info["history_len"], 4);
    assert_eq!(info["state"], "idle");

    let (status, _, _) =
        send(&app, request("DELETE", "/api/sessions/caller-7/context", Body::empty())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(state.sessions.get("caller-7").unwrap().history_len(), 0);

    let session = state.sessions.get("caller-7").unwrap();
    let (status, _, _) = send(&app, request("DELETE", "/api/sessions/caller-7", Body::empty())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(session.state(), PipelineState::Closed);

    let (status, _, body) = send(&app, request("GET", "/api/sessions/caller-7", Body::empty())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("caller-7"));
}

#[tokio::test]
async fn test_anonymous_stream_session_is_removed() {
    let state = app_state(false, 10);
    let app = create_router(state.clone());

    send(&app, request("POST", "/stream", Body::from("{\"text\":\"hello\"}\n"))).await;

    // The session is dropped by the stream task after the body ends
    for _ in 0..50 {
        if state.sessions.count() == 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(state.sessions.count(), 0);
}

#[tokio::test]
async fn test_session_limit() {
    let state = app_state(false, 1);
    let app = create_router(state.clone());

    let (status, _, _) = send(
        &app,
        request("POST", "/stream?session_id=first", Body::from("{\"text\":\"one\"}\n")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(
        &app,
        request("POST", "/stream?session_id=second", Body::from("{\"text\":\"two\"}\n")),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("error"));

    let (status, _, body) = send(&app, request("GET", "/ready", Body::empty())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("at_capacity"));
}

#[tokio::test]
async fn test_delete_unknown_session() {
    let app = create_router(app_state(false, 10));
    let (status, _, body) = send(&app, request("DELETE", "/api/sessions/ghost", Body::empty())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(serde_json::from_str::<Value>(&body).unwrap()["error"].is_string());
}
