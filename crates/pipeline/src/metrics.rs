//! Metric names and recording helpers
//!
//! Recording goes through the `metrics` facade; without an installed
//! recorder every call is a no-op.

use std::time::Duration;

pub const TURNS_TOTAL: &str = "voice_agent_turns_total";
pub const STAGE_LATENCY_SECONDS: &str = "voice_agent_stage_latency_seconds";
pub const ERRORS_TOTAL: &str = "voice_agent_errors_total";
pub const DROPPED_FRAMES_TOTAL: &str = "voice_agent_dropped_audio_frames_total";

/// Record one completed turn
pub fn record_turn(outcome: &'static str) {
    metrics::counter!(TURNS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a stage latency (`recognition`, `generation`, `synthesis`, `turn`)
pub fn record_stage_latency(stage: &'static str, elapsed: Duration) {
    metrics::histogram!(STAGE_LATENCY_SECONDS, "stage" => stage).record(elapsed.as_secs_f64());
}

pub fn record_error(kind: &'static str) {
    metrics::counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
}

pub fn record_dropped_frames(count: u64) {
    metrics::counter!(DROPPED_FRAMES_TOTAL).increment(count);
}
