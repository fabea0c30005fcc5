//! Authentication Middleware
//!
//! Shared-secret bearer authentication. Every path outside
//! `server.auth.public_paths` must carry `Authorization: Bearer <token>`.

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use voice_agent_config::Settings;

use crate::ServerError;

static AUTH_DISABLED_WARNED: AtomicBool = AtomicBool::new(false);

enum AuthCheck {
    Disabled,
    PublicPath,
    ConfigError(&'static str),
    CheckToken(String),
}

fn check_auth_config(settings: &Settings, path: &str) -> AuthCheck {
    let auth = &settings.server.auth;

    if !auth.enabled {
        if !AUTH_DISABLED_WARNED.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                "API authentication is disabled. Set VOICE_AGENT__SERVER__AUTH__ENABLED=true for production."
            );
        }
        return AuthCheck::Disabled;
    }

    if auth.public_paths.iter().any(|p| path.starts_with(p.as_str())) {
        return AuthCheck::PublicPath;
    }

    match &auth.token {
        Some(token) if !token.is_empty() => AuthCheck::CheckToken(token.clone()),
        _ => AuthCheck::ConfigError("Auth is enabled but no token is configured"),
    }
}

/// Reject requests without the configured bearer token.
///
/// Reads `Arc<Settings>` from the request extensions.
pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let settings = match request.extensions().get::<Arc<Settings>>() {
        Some(settings) => settings.clone(),
        None => {
            tracing::error!("Settings extension not found in request");
            return ServerError::Internal("server configuration error".to_string()).into_response();
        },
    };

    match check_auth_config(&settings, request.uri().path()) {
        AuthCheck::Disabled | AuthCheck::PublicPath => next.run(request).await,
        AuthCheck::ConfigError(msg) => {
            tracing::error!("{}", msg);
            ServerError::Internal("authentication not configured".to_string()).into_response()
        },
        AuthCheck::CheckToken(expected) => {
            let provided = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "));

            match provided {
                Some(token) if constant_time_compare(token.as_bytes(), expected.as_bytes()) => {
                    next.run(request).await
                },
                Some(_) => {
                    tracing::warn!(path = %request.uri().path(), "Invalid bearer token");
                    ServerError::Auth("Unauthorized".to_string()).into_response()
                },
                None => ServerError::Auth("Unauthorized".to_string()).into_response(),
            }
        },
    }
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
