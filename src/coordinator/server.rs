//! Top-level race coordinator
//!
//! The coordinator owns the shared pieces of the service: the active-session
//! set, the matchmaking pools and the id counters. It accepts transports,
//! enforces the connection limit and runs one handler task per connection.

use crate::config::AppConfig;
use crate::connection::{ConnectionContext, ConnectionHandler, FrameSink, Transport};
use crate::content::ContentSource;
use crate::coordinator::active::ActiveSessions;
use crate::error::Result;
use crate::matchmaking::MatchmakingRegistry;
use crate::metrics::MetricsCollector;
use crate::protocol::{encode, Message};
use crate::session::SessionLauncher;
use crate::store::ResultStore;
use crate::types::GameMode;
use crate::utils::IdGenerator;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Reason sent to both players of every race cancelled at shutdown
pub const SHUTDOWN_REASON: &str = "Server shutting down";

/// Point-in-time view of the coordinator
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStats {
    pub active_connections: usize,
    pub connections_accepted: u64,
    pub connections_rejected: u64,
    pub active_races: usize,
    pub active_races_by_mode: HashMap<String, usize>,
    pub races_started: u64,
    pub races_finished: u64,
    pub players_waiting: usize,
}

pub struct Coordinator {
    config: AppConfig,
    sessions: Arc<ActiveSessions>,
    registry: Arc<MatchmakingRegistry>,
    ctx: ConnectionContext,
    metrics: Arc<MetricsCollector>,
    connection_ids: IdGenerator,
    active_connections: Arc<AtomicUsize>,
    accepted: AtomicU64,
    rejected: AtomicU64,
    accepting: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

impl Coordinator {
    pub fn new(
        config: AppConfig,
        content: Arc<dyn ContentSource>,
        store: Arc<dyn ResultStore>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let sessions = Arc::new(ActiveSessions::new());
        let launcher = SessionLauncher::new(
            config.race.clone(),
            content,
            store.clone(),
            sessions.clone(),
            metrics.clone(),
        );
        let registry = Arc::new(MatchmakingRegistry::new(
            launcher,
            config.bot.clone(),
            metrics.clone(),
        ));
        let ctx = ConnectionContext {
            registry: registry.clone(),
            store,
            metrics: metrics.clone(),
            settings: config.service.clone(),
        };
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            sessions,
            registry,
            ctx,
            metrics,
            connection_ids: IdGenerator::new("P"),
            active_connections: Arc::new(AtomicUsize::new(0)),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            accepting: AtomicBool::new(true),
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn sessions(&self) -> Arc<ActiveSessions> {
        self.sessions.clone()
    }

    pub fn registry(&self) -> Arc<MatchmakingRegistry> {
        self.registry.clone()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Bind the configured game port
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr).await?;
        info!("Race coordinator listening on {}", addr);
        Ok(listener)
    }

    /// Accept TCP connections until shutdown
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer_addr) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!("Accept failed: {}", e);
                            continue;
                        }
                    };
                    match Transport::tcp(stream, self.config.service.max_frame_bytes) {
                        Ok(transport) => {
                            self.accept(transport);
                        }
                        Err(e) => warn!("Could not set up connection from {}: {}", peer_addr, e),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Accept loop stopping");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Take ownership of a transport and run its connection handler
    ///
    /// A refused connection still gets a task, which sends the ERROR reply
    /// and closes the transport.
    pub fn accept(&self, transport: Transport) -> JoinHandle<()> {
        if !self.is_accepting() {
            return self.refuse(transport, SHUTDOWN_REASON);
        }

        // Reserve a slot before spawning so the limit holds under bursts
        let max = self.config.service.max_connections;
        let reserved = self
            .active_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            });
        if reserved.is_err() {
            warn!(
                "Connection limit of {} reached, rejecting {}",
                max, transport.peer
            );
            self.metrics.record_connection_rejected();
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return self.refuse(transport, "Server is full");
        }

        let id = self.connection_ids.next_id();
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_connection_opened();

        let handler = ConnectionHandler::new(
            id,
            transport,
            self.ctx.clone(),
            self.shutdown_tx.subscribe(),
        );
        let active = self.active_connections.clone();

        tokio::spawn(async move {
            handler.run().await;
            active.fetch_sub(1, Ordering::SeqCst);
        })
    }

    fn refuse(&self, transport: Transport, reason: &'static str) -> JoinHandle<()> {
        let Transport { mut sink, peer, .. } = transport;
        tokio::spawn(async move {
            if let Ok(frame) = encode(&Message::error(reason)) {
                let _ = sink.send_frame(&frame).await;
            }
            let _ = sink.close().await;
            debug!("Refused connection from {}: {}", peer, reason);
        })
    }

    /// Cancel every race, wait for them to wind down, then close connections
    pub async fn shutdown(&self, grace: Duration) {
        info!("Coordinator shutting down");
        self.accepting.store(false, Ordering::SeqCst);

        let cancelled = self.sessions.cancel_all(SHUTDOWN_REASON);
        if cancelled > 0 {
            let deadline = Instant::now() + grace;
            while self.sessions.count() > 0 && Instant::now() < deadline {
                sleep(Duration::from_millis(20)).await;
            }
            let left = self.sessions.count();
            if left > 0 {
                warn!("{} sessions still running after shutdown grace period", left);
            }
        }

        // Receivers may all be gone already
        let _ = self.shutdown_tx.send(());
        info!("Coordinator stopped");
    }

    pub fn stats(&self) -> CoordinatorStats {
        let active_races_by_mode = self
            .sessions
            .count_by_mode()
            .into_iter()
            .map(|(mode, count)| (mode.as_str().to_string(), count))
            .collect();

        CoordinatorStats {
            active_connections: self.active_connections.load(Ordering::SeqCst),
            connections_accepted: self.accepted.load(Ordering::Relaxed),
            connections_rejected: self.rejected.load(Ordering::Relaxed),
            active_races: self.sessions.count(),
            active_races_by_mode,
            races_started: self.sessions.started(),
            races_finished: self.sessions.finished(),
            players_waiting: self.registry.total_waiting(),
        }
    }

    /// Players waiting in one mode's pool
    pub fn waiting(&self, mode: GameMode) -> usize {
        self.registry.waiting(mode)
    }
}
