//! Per-connection session state
//!
//! A session owns the bounded conversation history, the current pipeline
//! state and the cancellation token every stage of its pipeline derives from.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use voice_agent_core::{ConversationHistory, HistoryEntry};

/// Pipeline state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    #[default]
    Idle,
    Listening,
    Thinking,
    Speaking,
    Closed,
}

impl PipelineState {
    /// Caller audio is not accepted in these states
    pub fn is_busy(&self) -> bool {
        matches!(self, PipelineState::Thinking | PipelineState::Speaking)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Listening => "listening",
            PipelineState::Thinking => "thinking",
            PipelineState::Speaking => "speaking",
            PipelineState::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// Serializable view of a session for the management API
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub state: PipelineState,
    pub history_len: usize,
    pub created_at: DateTime<Utc>,
    pub idle_secs: u64,
}

/// One caller session
pub struct Session {
    id: String,
    history: Mutex<ConversationHistory>,
    state: Mutex<PipelineState>,
    cancel: CancellationToken,
    created_at: DateTime<Utc>,
    last_activity: Mutex<Instant>,
    /// Held for the duration of one turn
    turn_lock: tokio::sync::Mutex<()>,
}

impl Session {
    pub fn new(id: impl Into<String>, max_history: usize) -> Self {
        Self {
            id: id.into(),
            history: Mutex::new(ConversationHistory::new(max_history)),
            state: Mutex::new(PipelineState::Idle),
            cancel: CancellationToken::new(),
            created_at: Utc::now(),
            last_activity: Mutex::new(Instant::now()),
            turn_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Session with a random id
    pub fn generate(max_history: usize) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), max_history)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    /// Move to `to`. Returns the previous state when it changed.
    ///
    /// `Closed` is terminal: once there, every transition is refused.
    pub fn set_state(&self, to: PipelineState) -> Option<PipelineState> {
        let mut state = self.state.lock();
        let from = *state;
        if from == to || from == PipelineState::Closed {
            return None;
        }
        *state = to;
        tracing::debug!(session_id = %self.id, %from, %to, "State transition");
        Some(from)
    }

    /// Move to `to` only if the current state is `from`
    pub fn transition_if(&self, from: PipelineState, to: PipelineState) -> bool {
        let mut state = self.state.lock();
        if *state != from || from == to {
            return false;
        }
        *state = to;
        tracing::debug!(session_id = %self.id, %from, %to, "State transition");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.state() == PipelineState::Closed
    }

    /// Snapshot of the history, oldest first
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().entries()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    /// Append a completed turn
    /// Append a turn. A closed session keeps its history empty.
    pub fn record_turn(&self, query: &str, response: &str) {
        let mut history = self.history.lock();
        if self.cancel.is_cancelled() {
            return;
        }
        history.record_turn(query, response);
    }

    pub fn clear_context(&self) {
        self.history.lock().clear();
        tracing::info!(session_id = %self.id, "Conversation context cleared");
    }

    /// Token cancelled when the session closes
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn turn_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.turn_lock
    }

    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Cancel in-flight work, drop the history and enter `Closed`
    pub fn close(&self) {
        self.cancel.cancel();
        self.history.lock().clear();
        *self.state.lock() = PipelineState::Closed;
        tracing::info!(session_id = %self.id, "Session closed");
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            state: self.state(),
            history_len: self.history_len(),
            created_at: self.created_at,
            idle_secs: self.idle_for().as_secs(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("history_len", &self.history_len())
            .finish()
    }
}
