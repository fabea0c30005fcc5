//! Voice Agent Server
//!
//! WebSocket and HTTP surface for the telecom support agent: live audio
//! sessions over `/ws`, text turns over `/stream`, plus session management,
//! health and metrics endpoints.

pub mod auth;
pub mod http;
pub mod media;
pub mod metrics;
pub mod session;
pub mod state;
pub mod stream;
pub mod websocket;

pub use auth::auth_middleware;
pub use http::create_router;
pub use media::{HttpMediaEngine, MediaEngine};
pub use metrics::{init_metrics, record_active_sessions, record_session_created};
pub use session::SessionManager;
pub use state::AppState;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Session not found: {0}")]
    Session(String),

    #[error("Session limit reached ({0} active)")]
    Capacity(usize),

    #[error("Media negotiation failed: {0}")]
    Media(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Auth(_) => StatusCode::UNAUTHORIZED,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Session(_) => StatusCode::NOT_FOUND,
            ServerError::Capacity(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Media(_) => StatusCode::BAD_GATEWAY,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        err.status()
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<ServerError> for voice_agent_core::Error {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Auth(msg) => voice_agent_core::Error::Authentication(msg),
            other => voice_agent_core::Error::Internal(other.to_string()),
        }
    }
}
