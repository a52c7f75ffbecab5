//! Per-connection message loop
//!
//! Every accepted transport gets one `ConnectionHandler` task. The handler
//! performs the CONNECT handshake, hands the player to matchmaking and then
//! forwards decoded frames to the race the player was seated in. Outbound
//! messages go through a bounded queue drained by a writer task, so a session
//! never waits on a slow socket.

use crate::bot::BotDifficulty;
use crate::config::ServiceSettings;
use crate::connection::channel::{FrameSink, FrameSource, Transport};
use crate::error::{RaceError, Result};
use crate::matchmaking::MatchmakingRegistry;
use crate::metrics::MetricsCollector;
use crate::protocol::{decode, encode, Message};
use crate::session::{Participant, SessionHandle};
use crate::store::{MatchResult, ResultStore};
use crate::types::{GameMode, ParticipantId, ParticipantKind, Progress};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// The race seat of a human connection
pub struct ConnectionPeer {
    id: ParticipantId,
    name: String,
    outbound: mpsc::Sender<Message>,
    seat: Mutex<SeatSlot>,
}

/// Session and liveness of a connection, updated together
#[derive(Default)]
struct SeatSlot {
    session: Option<SessionHandle>,
    closed: bool,
}

impl ConnectionPeer {
    fn new(id: ParticipantId, name: String, outbound: mpsc::Sender<Message>) -> Self {
        Self {
            id,
            name,
            outbound,
            seat: Mutex::new(SeatSlot::default()),
        }
    }

    /// The race this connection is seated in, if any
    pub fn session(&self) -> Option<SessionHandle> {
        self.seat.lock().ok().and_then(|s| s.session.clone())
    }

    /// Mark the connection gone and return the session it was seated in
    ///
    /// A session attached after this point is told about the disconnect
    /// straight away.
    fn close(&self) -> Option<SessionHandle> {
        match self.seat.lock() {
            Ok(mut slot) => {
                slot.closed = true;
                slot.session.clone()
            }
            Err(_) => {
                error!("Connection '{}' session slot poisoned", self.id);
                None
            }
        }
    }

    /// Log a protocol error and answer it with ERROR
    fn reply_error(&self, metrics: &MetricsCollector, kind: &str, message: String) {
        debug!("Connection '{}' protocol error ({}): {}", self.id, kind, message);
        metrics.record_protocol_error(kind);
        if self.send_now(Message::error(message)).is_err() {
            debug!("Connection '{}' error reply dropped", self.id);
        }
    }

    /// Queue without waiting; a full or closed queue means the peer is gone
    fn send_now(&self, message: Message) -> Result<()> {
        self.outbound.try_send(message).map_err(|_| {
            RaceError::ParticipantUnreachable {
                participant_id: self.id.clone(),
            }
            .into()
        })
    }
}

#[async_trait]
impl Participant for ConnectionPeer {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ParticipantKind {
        ParticipantKind::Human
    }

    async fn deliver(&self, message: Message) -> Result<()> {
        self.send_now(message)
    }

    fn attach(&self, session: SessionHandle) {
        let closed = match self.seat.lock() {
            Ok(mut slot) => {
                if slot.session.is_some() {
                    warn!("Connection '{}' re-attached to a new session", self.id);
                }
                slot.session = Some(session.clone());
                slot.closed
            }
            Err(_) => {
                error!("Connection '{}' session slot poisoned", self.id);
                true
            }
        };

        // Paired while the connection was closing
        if closed {
            info!(
                "Connection '{}' closed before session {} attached",
                self.id,
                session.id()
            );
            session.on_participant_disconnected(&self.id);
        }
    }
}

/// Collaborators shared by every connection
#[derive(Clone)]
pub struct ConnectionContext {
    pub registry: Arc<MatchmakingRegistry>,
    pub store: Arc<dyn ResultStore>,
    pub metrics: Arc<MetricsCollector>,
    pub settings: ServiceSettings,
}

/// Whether the receive loop keeps going after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// What the first frame of a connection asked for
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    pub player_name: String,
    pub mode: GameMode,
    pub difficulty: Option<BotDifficulty>,
}

impl Handshake {
    /// Interpret the first frame; anything but CONNECT is rejected
    pub fn from_frame(frame: &str) -> Result<Self> {
        let message = decode(frame).map_err(|e| RaceError::HandshakeRejected {
            reason: e.to_string(),
        })?;

        let Message::Connect {
            player_name,
            game_mode,
            difficulty,
        } = message
        else {
            return Err(RaceError::HandshakeRejected {
                reason: "First message must be CONNECT".to_string(),
            }
            .into());
        };

        let mode = match game_mode.as_deref().map(str::parse::<GameMode>) {
            Some(Ok(mode)) => mode,
            Some(Err(_)) | None => {
                warn!(
                    "Unknown game mode {:?} from '{}', falling back to practice",
                    game_mode, player_name
                );
                GameMode::Practice
            }
        };

        let difficulty = difficulty.as_deref().and_then(|d| match d.parse() {
            Ok(difficulty) => Some(difficulty),
            Err(_) => {
                warn!("Unknown bot difficulty '{}', using the default", d);
                None
            }
        });

        Ok(Self {
            player_name: player_name.trim().to_string(),
            mode,
            difficulty,
        })
    }
}

pub struct ConnectionHandler {
    id: ParticipantId,
    transport: Transport,
    ctx: ConnectionContext,
    shutdown: broadcast::Receiver<()>,
}

impl ConnectionHandler {
    pub fn new(
        id: ParticipantId,
        transport: Transport,
        ctx: ConnectionContext,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            id,
            transport,
            ctx,
            shutdown,
        }
    }

    /// Run the connection to completion
    pub async fn run(self) {
        let Self {
            id,
            transport,
            ctx,
            mut shutdown,
        } = self;
        let Transport {
            mut source,
            mut sink,
            peer,
        } = transport;

        info!("Connection '{}' opened from {}", id, peer);

        let handshake = match Self::handshake(&id, source.as_mut(), &ctx).await {
            Ok(handshake) => handshake,
            Err(e) => {
                warn!("Connection '{}' rejected: {}", id, e);
                ctx.metrics.record_protocol_error("handshake");
                let reason = match e.downcast_ref::<RaceError>() {
                    Some(RaceError::HandshakeRejected { reason }) => reason.clone(),
                    _ => e.to_string(),
                };
                if let Ok(frame) = encode(&Message::error(reason)) {
                    let _ = sink.send_frame(&frame).await;
                }
                let _ = sink.close().await;
                ctx.metrics.record_connection_closed();
                return;
            }
        };

        let name = if handshake.player_name.is_empty() {
            id.clone()
        } else {
            handshake.player_name.clone()
        };
        info!(
            "Connection '{}' is '{}' - mode: {}",
            id, name, handshake.mode
        );

        let (outbound_tx, outbound_rx) = mpsc::channel(ctx.settings.outbound_buffer.max(1));
        let (stop_tx, stop_rx) = oneshot::channel();
        // Detached: it exits after the guard stops it and the queue is flushed
        tokio::spawn(write_loop(id.clone(), sink, outbound_rx, stop_rx));

        let participant = Arc::new(ConnectionPeer::new(id.clone(), name, outbound_tx));
        let guard = ConnectionGuard {
            peer: participant.clone(),
            mode: handshake.mode,
            ctx: ctx.clone(),
            stop: Some(stop_tx),
        };

        if let Err(e) = ctx
            .registry
            .enqueue(handshake.mode, participant.clone(), handshake.difficulty)
            .await
        {
            error!("Connection '{}' could not be matched: {}", id, e);
            let _ = participant.send_now(Message::error("Unable to start a race right now"));
            drop(guard);
            return;
        }

        let mut practice_progress: Option<Progress> = None;

        loop {
            tokio::select! {
                frame = source.next_frame() => match frame {
                    Ok(Some(frame)) => {
                        let flow = dispatch(
                            &participant,
                            handshake.mode,
                            &frame,
                            &mut practice_progress,
                            &ctx.metrics,
                        );
                        if flow == Flow::Stop {
                            debug!("Connection '{}' sent DISCONNECT", id);
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("Connection '{}' closed by peer", id);
                        break;
                    }
                    Err(e) => match e.downcast_ref::<RaceError>() {
                        Some(RaceError::MalformedFrame { reason }) => {
                            participant.reply_error(&ctx.metrics, "malformed", reason.clone());
                        }
                        _ => {
                            warn!("Connection '{}' read failed: {}", id, e);
                            break;
                        }
                    },
                },
                _ = participant.outbound.closed() => {
                    debug!("Connection '{}' writer stopped", id);
                    break;
                }
                _ = shutdown.recv() => {
                    debug!("Connection '{}' closing for shutdown", id);
                    break;
                }
            }
        }

        if handshake.mode == GameMode::Practice {
            if let Some(progress) = practice_progress {
                report_practice(&participant, progress, ctx.store.as_ref(), &ctx.metrics).await;
            }
        }

        drop(guard);
        info!("Connection '{}' closed", id);
    }

    async fn handshake(
        id: &str,
        source: &mut dyn FrameSource,
        ctx: &ConnectionContext,
    ) -> Result<Handshake> {
        let first = timeout(ctx.settings.handshake_timeout(), source.next_frame())
            .await
            .map_err(|_| RaceError::HandshakeRejected {
                reason: "Timed out waiting for CONNECT".to_string(),
            })??;

        let Some(frame) = first else {
            return Err(RaceError::HandshakeRejected {
                reason: format!("Connection '{}' closed before CONNECT", id),
            }
            .into());
        };

        Handshake::from_frame(&frame)
    }
}

/// Apply one inbound frame
fn dispatch(
    peer: &ConnectionPeer,
    mode: GameMode,
    frame: &str,
    practice_progress: &mut Option<Progress>,
    metrics: &MetricsCollector,
) -> Flow {
    let reply_error = |kind: &str, message: String| peer.reply_error(metrics, kind, message);

    let message = match decode(frame) {
        Ok(message) => message,
        Err(e) => {
            reply_error("malformed", e.to_string());
            return Flow::Continue;
        }
    };

    match message {
        Message::Disconnect => return Flow::Stop,
        Message::Connect { .. } => {
            reply_error("duplicate_connect", "Already connected".to_string());
            return Flow::Continue;
        }
        ref other if !other.is_client_message() => {
            reply_error(
                "unexpected_type",
                format!("Unexpected message type: {}", other.tag()),
            );
            return Flow::Continue;
        }
        _ => {}
    }

    if mode == GameMode::Practice {
        if let Message::ProgressUpdate { progress } = message {
            match progress.validate_after(practice_progress.as_ref()) {
                Ok(()) => *practice_progress = Some(progress),
                Err(e) => reply_error("invalid_progress", e.to_string()),
            }
        }
        return Flow::Continue;
    }

    let Some(session) = peer.session() else {
        reply_error("not_in_race", "Not in a race yet".to_string());
        return Flow::Continue;
    };
    if session.is_ended() {
        reply_error("race_ended", "Race has already ended".to_string());
        return Flow::Continue;
    }

    let applied = match message {
        Message::Ready => session.on_ready(&peer.id),
        Message::ProgressUpdate { progress } => session.on_progress(&peer.id, progress),
        Message::WordValidation { typed_word } => {
            session.on_word_validation(&peer.id, typed_word)
        }
        _ => Ok(()),
    };
    if let Err(e) = applied {
        let kind = match e.downcast_ref::<RaceError>() {
            Some(RaceError::InvalidProgress { .. }) => "invalid_progress",
            Some(RaceError::RaceNotInProgress { .. }) => "not_in_progress",
            _ => "rejected",
        };
        reply_error(kind, e.to_string());
    }

    Flow::Continue
}

async fn report_practice(
    peer: &ConnectionPeer,
    progress: Progress,
    store: &dyn ResultStore,
    metrics: &MetricsCollector,
) {
    let result = MatchResult {
        participant_id: peer.id.clone(),
        participant_name: peer.name.clone(),
        kind: ParticipantKind::Human,
        wpm: progress.wpm,
        accuracy: progress.accuracy,
        words_typed: progress.words_completed,
        duration_ms: progress.elapsed_time,
        mode: GameMode::Practice,
        won: false,
        finished_at: Utc::now(),
    };
    if let Err(e) = store.report_match_result(result).await {
        warn!("Failed to report practice result for '{}': {}", peer.id, e);
        metrics.record_result_report_failure();
    }
}

/// Drains the outbound queue into the sink
async fn write_loop(
    id: ParticipantId,
    mut sink: Box<dyn FrameSink>,
    mut outbound: mpsc::Receiver<Message>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            message = outbound.recv() => {
                let Some(message) = message else { break };
                if let Err(e) = write_message(sink.as_mut(), &message).await {
                    debug!("Connection '{}' write failed: {}", id, e);
                    break;
                }
            }
            _ = &mut stop => {
                // Flush what is already queued, then hang up
                while let Ok(message) = outbound.try_recv() {
                    if write_message(sink.as_mut(), &message).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }

    if let Err(e) = sink.close().await {
        debug!("Connection '{}' close failed: {}", id, e);
    }
}

async fn write_message(sink: &mut dyn FrameSink, message: &Message) -> Result<()> {
    let frame = encode(message)?;
    sink.send_frame(&frame).await
}

/// Runs the disconnect bookkeeping on every exit path of the receive loop
struct ConnectionGuard {
    peer: Arc<ConnectionPeer>,
    mode: GameMode,
    ctx: ConnectionContext,
    stop: Option<oneshot::Sender<()>>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        match self.peer.close() {
            Some(session) => session.on_participant_disconnected(&self.peer.id),
            None => {
                if self.ctx.registry.withdraw(self.mode, &self.peer.id) {
                    info!(
                        "Connection '{}' left the {} pool",
                        self.peer.id, self.mode
                    );
                }
            }
        }

        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }

        self.ctx.metrics.record_connection_closed();
    }
}
