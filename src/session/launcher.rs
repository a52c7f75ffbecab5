//! Creation of race sessions from matched participants

use crate::config::RaceSettings;
use crate::content::ContentSource;
use crate::metrics::MetricsCollector;
use crate::session::participant::Participant;
use crate::session::race::{RaceSession, SessionEvents, SessionHandle};
use crate::store::ResultStore;
use crate::types::GameMode;
use std::sync::Arc;
use tracing::info;

/// Builds sessions with the shared collaborators and spawns their tasks
#[derive(Clone)]
pub struct SessionLauncher {
    rules: RaceSettings,
    content: Arc<dyn ContentSource>,
    store: Arc<dyn ResultStore>,
    events: Arc<dyn SessionEvents>,
    metrics: Arc<MetricsCollector>,
}

impl SessionLauncher {
    pub fn new(
        rules: RaceSettings,
        content: Arc<dyn ContentSource>,
        store: Arc<dyn ResultStore>,
        events: Arc<dyn SessionEvents>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            rules,
            content,
            store,
            events,
            metrics,
        }
    }

    pub fn rules(&self) -> &RaceSettings {
        &self.rules
    }

    pub fn content(&self) -> Arc<dyn ContentSource> {
        self.content.clone()
    }

    pub fn store(&self) -> Arc<dyn ResultStore> {
        self.store.clone()
    }

    /// Seat two participants in a new session and start it
    ///
    /// Must be called from within a Tokio runtime.
    pub fn launch(&self, mode: GameMode, players: [Arc<dyn Participant>; 2]) -> SessionHandle {
        let session = RaceSession::new(
            mode,
            players.clone(),
            self.rules.clone(),
            self.content.clone(),
            self.store.clone(),
            self.events.clone(),
            self.metrics.clone(),
        );

        info!(
            "Created session {} - mode: {}, participants: '{}' ({}) vs '{}' ({})",
            session.id(),
            mode,
            players[0].id(),
            players[0].kind(),
            players[1].id(),
            players[1].kind()
        );

        self.events.session_started(&session);
        self.metrics.record_race_started(mode);

        for player in &players {
            player.attach(session.clone());
        }

        tokio::spawn(session.clone().run());
        session
    }
}
