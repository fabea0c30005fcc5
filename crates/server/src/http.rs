//! HTTP Endpoints
//!
//! Router, health/readiness, and the session management API.

use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use voice_agent_pipeline::SessionInfo;

use crate::auth::auth_middleware;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::stream::stream_handler;
use crate::websocket::ws_handler;
use crate::ServerError;

const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        &state.config.server.cors_origins,
        state.config.server.cors_enabled,
    );

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/ws", get(ws_handler))
        .route("/stream", post(stream_handler))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/context", delete(clear_context));

    if state.config.observability.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .layer(axum::middleware::from_fn(auth_middleware))
        .layer(Extension(state.config.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// CORS from configured origins.
///
/// Disabled means permissive (development only). No valid origins falls
/// back to the local frontend.
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if parsed_origins.is_empty() {
        tracing::info!("No valid CORS origins configured, defaulting to {}", DEFAULT_CORS_ORIGIN);
        return layer.allow_origin(HeaderValue::from_static(DEFAULT_CORS_ORIGIN));
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    layer.allow_origin(parsed_origins)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize)]
struct Readiness {
    status: &'static str,
    stt_provider: String,
    tts_provider: String,
    sessions: usize,
    max_sessions: usize,
}

/// Ready while the registry can still accept sessions
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let sessions = state.sessions.count();
    let max_sessions = state.sessions.max_sessions();
    let (status, label) = if sessions < max_sessions {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "at_capacity")
    };

    (
        status,
        Json(Readiness {
            status: label,
            stt_provider: state.recognizer.provider_name().to_string(),
            tts_provider: state.synthesizer.provider_name().to_string(),
            sessions,
            max_sessions,
        }),
    )
}

#[derive(Debug, Serialize)]
struct SessionList {
    count: usize,
    sessions: Vec<SessionInfo>,
}

async fn list_sessions(State(state): State<AppState>) -> Json<SessionList> {
    let sessions = state.sessions.list();
    Json(SessionList {
        count: sessions.len(),
        sessions,
    })
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, ServerError> {
    let session = state.sessions.get(&id).ok_or(ServerError::Session(id))?;
    Ok(Json(session.info()))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    if state.sessions.remove(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServerError::Session(id))
    }
}

/// Forget the conversation history but keep the session
async fn clear_context(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    let session = state.sessions.get(&id).ok_or(ServerError::Session(id))?;
    session.clear_context();
    tracing::info!(session_id = %session.id(), "Conversation context cleared");
    Ok(StatusCode::NO_CONTENT)
}
