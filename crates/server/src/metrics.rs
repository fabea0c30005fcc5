//! Prometheus metrics
//!
//! Turn, stage latency, error and dropped-audio metrics are recorded by the
//! pipeline crate; this module installs the recorder, owns the session
//! metrics and serves `GET /metrics`.

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use voice_agent_pipeline::metrics as pipeline_metrics;

use crate::ServerError;

pub const SESSIONS_ACTIVE: &str = "voice_agent_sessions_active";
pub const SESSIONS_CREATED_TOTAL: &str = "voice_agent_sessions_created_total";

const LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0];

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Call once at startup.
pub fn init_metrics() -> Result<PrometheusHandle, ServerError> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(pipeline_metrics::STAGE_LATENCY_SECONDS.to_string()),
            LATENCY_BUCKETS,
        )
        .map_err(|e| ServerError::Internal(format!("invalid histogram buckets: {}", e)))?
        .install_recorder()
        .map_err(|e| ServerError::Internal(format!("failed to install metrics recorder: {}", e)))?;

    describe_metrics();
    gauge!(SESSIONS_ACTIVE).set(0.0);

    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}

fn describe_metrics() {
    describe_gauge!(SESSIONS_ACTIVE, "Sessions currently registered");
    describe_counter!(SESSIONS_CREATED_TOTAL, "Sessions created since start");
    describe_counter!(pipeline_metrics::TURNS_TOTAL, "Completed turns by outcome");
    describe_histogram!(
        pipeline_metrics::STAGE_LATENCY_SECONDS,
        Unit::Seconds,
        "Latency per pipeline stage"
    );
    describe_counter!(pipeline_metrics::ERRORS_TOTAL, "Pipeline errors by kind");
    describe_counter!(
        pipeline_metrics::DROPPED_FRAMES_TOTAL,
        "Caller audio frames dropped while the agent was busy"
    );
}

pub fn record_session_created() {
    counter!(SESSIONS_CREATED_TOTAL).increment(1);
}

pub fn record_active_sessions(count: usize) {
    gauge!(SESSIONS_ACTIVE).set(count as f64);
}

/// `GET /metrics`
pub async fn metrics_handler() -> impl IntoResponse {
    match METRICS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics disabled").into_response(),
    }
}
