//! Session Management
//!
//! The registry of live sessions. Sessions are created on connect (or on
//! first use of an unseen id), closed on disconnect, and reaped once idle
//! for longer than `server.session_idle_timeout_secs`.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use voice_agent_config::Settings;
use voice_agent_pipeline::{Session, SessionInfo};

use crate::metrics::{record_active_sessions, record_session_created};
use crate::ServerError;

const MAX_SESSION_ID_LEN: usize = 128;

/// Session manager
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    max_sessions: usize,
    session_timeout: Duration,
    cleanup_interval: Duration,
    max_history: usize,
}

impl SessionManager {
    pub fn new(settings: &Settings) -> Self {
        Self::with_limits(
            settings.server.max_sessions,
            Duration::from_secs(settings.server.session_idle_timeout_secs),
            Duration::from_secs(settings.server.cleanup_interval_secs),
            settings.pipeline.max_history,
        )
    }

    pub fn with_limits(
        max_sessions: usize,
        session_timeout: Duration,
        cleanup_interval: Duration,
        max_history: usize,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
            session_timeout,
            cleanup_interval,
            max_history,
        }
    }

    /// Periodically remove idle sessions until `true` is sent on the
    /// returned channel.
    pub fn start_cleanup_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let manager = Arc::clone(self);
        let interval = manager.cleanup_interval.max(Duration::from_millis(10));

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let removed = manager.cleanup_expired();
                        if removed > 0 {
                            tracing::info!(
                                removed,
                                remaining = manager.count(),
                                "Session cleanup removed expired sessions"
                            );
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::info!("Session cleanup task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }

    /// Create a session with a generated id
    pub fn create(&self) -> Result<Arc<Session>, ServerError> {
        self.insert(Session::generate(self.max_history))
    }

    /// Look up `id`, creating a session under that id when it is unseen.
    /// `None` always creates a fresh session.
    pub fn get_or_create(&self, id: Option<&str>) -> Result<Arc<Session>, ServerError> {
        let Some(id) = id else {
            return self.create();
        };
        let id = id.trim();
        if id.is_empty() || id.len() > MAX_SESSION_ID_LEN {
            return Err(ServerError::InvalidRequest(format!(
                "session_id must be 1 to {} characters",
                MAX_SESSION_ID_LEN
            )));
        }
        if let Some(session) = self.get(id) {
            return Ok(session);
        }
        self.insert(Session::new(id, self.max_history))
    }

    fn insert(&self, session: Session) -> Result<Arc<Session>, ServerError> {
        let mut sessions = self.sessions.write();

        // Another request may have registered the same id in the meantime
        if let Some(existing) = sessions.get(session.id()) {
            return Ok(existing.clone());
        }

        if sessions.len() >= self.max_sessions {
            self.cleanup_expired_internal(&mut sessions);
            if sessions.len() >= self.max_sessions {
                tracing::warn!(max_sessions = self.max_sessions, "Session limit reached");
                return Err(ServerError::Capacity(sessions.len()));
            }
        }

        let session = Arc::new(session);
        sessions.insert(session.id().to_string(), session.clone());
        record_session_created();
        record_active_sessions(sessions.len());

        tracing::info!(session_id = %session.id(), active = sessions.len(), "Created session");
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Close and unregister a session. Returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.remove(id) {
            Some(session) => {
                session.close();
                record_active_sessions(sessions.len());
                tracing::info!(session_id = %id, "Removed session");
                true
            },
            None => false,
        }
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Snapshot of every registered session, oldest first
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self.sessions.read().values().map(|s| s.info()).collect();
        infos.sort_by_key(|info| info.created_at);
        infos
    }

    /// Remove sessions idle for longer than the timeout. Returns how many went.
    pub fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write();
        self.cleanup_expired_internal(&mut sessions)
    }

    fn cleanup_expired_internal(&self, sessions: &mut HashMap<String, Arc<Session>>) -> usize {
        let timeout = self.session_timeout;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| s.idle_for() > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if let Some(session) = sessions.remove(id) {
                session.close();
                tracing::info!(session_id = %id, "Expired session");
            }
        }
        if !expired.is_empty() {
            record_active_sessions(sessions.len());
        }
        expired.len()
    }

    /// Close every session, used on shutdown
    pub fn close_all(&self) {
        let drained: Vec<Arc<Session>> = self.sessions.write().drain().map(|(_, s)| s).collect();
        for session in &drained {
            session.close();
        }
        record_active_sessions(0);
        if !drained.is_empty() {
            tracing::info!(closed = drained.len(), "Closed all sessions");
        }
    }
}
