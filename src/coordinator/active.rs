//! The set of races currently running

use crate::session::{SessionEvents, SessionHandle, SessionSummary};
use crate::types::{GameMode, SessionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// Tracks live sessions; registered as every session's event listener
#[derive(Default)]
pub struct ActiveSessions {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    started: AtomicU64,
    finished: AtomicU64,
}

impl ActiveSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn count_by_mode(&self) -> HashMap<GameMode, usize> {
        let mut counts = HashMap::new();
        if let Ok(sessions) = self.sessions.read() {
            for session in sessions.values() {
                *counts.entry(session.mode()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.read().ok().and_then(|s| s.get(id).cloned())
    }

    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub fn finished(&self) -> u64 {
        self.finished.load(Ordering::Relaxed)
    }

    /// Handles to every live session
    pub fn snapshot(&self) -> Vec<SessionHandle> {
        match self.sessions.read() {
            Ok(sessions) => sessions.values().cloned().collect(),
            Err(_) => {
                warn!("Active session map poisoned");
                Vec::new()
            }
        }
    }

    /// Cancel every live session; returns how many were signalled
    pub fn cancel_all(&self, reason: &str) -> usize {
        // Snapshot first: cancelled sessions remove themselves from the map
        let sessions = self.snapshot();
        for session in &sessions {
            session.cancel(reason);
        }
        info!("Cancelled {} active sessions: {}", sessions.len(), reason);
        sessions.len()
    }
}

impl SessionEvents for ActiveSessions {
    fn session_started(&self, session: &SessionHandle) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(session.id(), session.clone());
        }
        self.started.fetch_add(1, Ordering::Relaxed);
        debug!("Session {} registered", session.id());
    }

    fn session_ended(&self, summary: &SessionSummary) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.remove(&summary.session_id);
        }
        self.finished.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Session {} unregistered - {} race, reason: {}",
            summary.session_id,
            summary.mode,
            summary.reason.label()
        );
    }
}
