//! Race session lifecycle
//!
//! A `RaceSession` runs as its own task: it sends GAME_START, waits for both
//! seats to be ready, then ticks the broadcast loop until an end condition
//! holds. Participant input (ready, progress, typed words, disconnects) is
//! applied synchronously under the session lock and never blocks on I/O.

use crate::config::RaceSettings;
use crate::content::ContentSource;
use crate::error::{RaceError, Result};
use crate::metrics::MetricsCollector;
use crate::protocol::Message;
use crate::session::participant::Participant;
use crate::session::state::{EndReason, RaceState, SeatInfo, SessionPhase, TickPlan};
use crate::store::ResultStore;
use crate::types::{GameMode, ParticipantId, Progress, SessionId};
use crate::utils::generate_session_id;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub type SessionHandle = Arc<RaceSession>;

/// Summary handed to the listener when a race ends
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub mode: GameMode,
    pub participants: [ParticipantId; 2],
    pub reason: EndReason,
    pub winner: Option<ParticipantId>,
    pub duration: Duration,
}

/// Listener for session lifecycle; the coordinator's active-session set
pub trait SessionEvents: Send + Sync {
    fn session_started(&self, session: &SessionHandle);
    fn session_ended(&self, summary: &SessionSummary);
}

pub struct RaceSession {
    id: SessionId,
    mode: GameMode,
    rules: RaceSettings,
    participant_ids: [ParticipantId; 2],
    /// The single lock guarding all per-race state
    state: Mutex<RaceState>,
    /// Released when the race ends
    participants: Mutex<Option<[Arc<dyn Participant>; 2]>>,
    content: Arc<dyn ContentSource>,
    store: Arc<dyn ResultStore>,
    events: Arc<dyn SessionEvents>,
    metrics: Arc<MetricsCollector>,
    wake: Notify,
    phase_tx: watch::Sender<SessionPhase>,
}

impl RaceSession {
    pub fn new(
        mode: GameMode,
        participants: [Arc<dyn Participant>; 2],
        rules: RaceSettings,
        content: Arc<dyn ContentSource>,
        store: Arc<dyn ResultStore>,
        events: Arc<dyn SessionEvents>,
        metrics: Arc<MetricsCollector>,
    ) -> SessionHandle {
        let id = generate_session_id();
        let seat = |p: &Arc<dyn Participant>| SeatInfo {
            id: p.id().to_string(),
            name: p.name().to_string(),
            kind: p.kind(),
        };
        let seats = [seat(&participants[0]), seat(&participants[1])];
        let participant_ids = [seats[0].id.clone(), seats[1].id.clone()];
        let state = RaceState::new(id, mode, seats, rules.initial_health);
        let (phase_tx, _) = watch::channel(SessionPhase::AwaitingReady);

        Arc::new(Self {
            id,
            mode,
            rules,
            participant_ids,
            state: Mutex::new(state),
            participants: Mutex::new(Some(participants)),
            content,
            store,
            events,
            metrics,
            wake: Notify::new(),
            phase_tx,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn participant_ids(&self) -> &[ParticipantId; 2] {
        &self.participant_ids
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase_tx.borrow()
    }

    pub fn is_ended(&self) -> bool {
        self.phase() == SessionPhase::Ended
    }

    /// Follow phase changes
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RaceState) -> T) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| RaceError::lock_poisoned("session"))?;
        Ok(f(&mut state))
    }

    pub fn on_ready(&self, participant_id: &str) -> Result<()> {
        self.with_state(|s| s.mark_ready(participant_id))??;
        debug!("Session {} - '{}' is ready", self.id, participant_id);
        self.wake.notify_one();
        Ok(())
    }

    pub fn on_progress(&self, participant_id: &str, progress: Progress) -> Result<()> {
        self.with_state(|s| s.record_progress(participant_id, progress))?
    }

    pub fn on_word_validation(&self, participant_id: &str, typed_word: String) -> Result<()> {
        self.with_state(|s| s.queue_validation(participant_id, typed_word))?
    }

    /// Called on every exit path of a participant's connection
    pub fn on_participant_disconnected(&self, participant_id: &str) {
        match self.with_state(|s| s.mark_disconnected(participant_id)) {
            Ok(true) => {
                info!("Session {} - '{}' disconnected", self.id, participant_id);
                self.wake.notify_one();
            }
            Ok(false) => {}
            Err(e) => error!("Session {} - failed to record disconnect: {}", self.id, e),
        }
    }

    /// End the race without a winner
    pub fn cancel(&self, reason: &str) {
        if let Err(e) = self.with_state(|s| s.cancel(reason.to_string())) {
            error!("Session {} - failed to cancel: {}", self.id, e);
        }
        self.wake.notify_one();
    }

    /// Drive the race to completion; spawned once per session
    pub async fn run(self: Arc<Self>) {
        info!(
            "Race {} starting - mode: {}, participants: '{}' vs '{}'",
            self.id, self.mode, self.participant_ids[0], self.participant_ids[1]
        );

        let reason = match self.drive().await {
            Ok(reason) => reason,
            Err(e) => {
                error!("Race {} aborted: {}", self.id, e);
                EndReason::Cancelled {
                    reason: "Race aborted due to a server error".to_string(),
                }
            }
        };

        self.finish(reason).await;
    }

    async fn drive(&self) -> Result<EndReason> {
        let words = self.content.word_list(self.rules.word_count).await?;
        if words.is_empty() {
            return Err(RaceError::ContentUnavailable {
                message: "content source returned no words".to_string(),
            }
            .into());
        }

        let starts = self.with_state(|s| s.install_words(words))?;
        self.send_all(starts.into()).await;

        // Readiness: wake on READY or disconnect, poll as a fallback
        loop {
            if let Some(reason) = self.with_state(|s| s.interrupt())? {
                return Ok(reason);
            }
            if self.with_state(|s| s.both_ready())? {
                break;
            }
            tokio::select! {
                _ = self.wake.notified() => {}
                _ = sleep(self.rules.ready_poll()) => {}
            }
        }

        self.with_state(|s| s.begin(Instant::now()))?;
        self.phase_tx.send_replace(SessionPhase::InProgress);
        info!("Race {} in progress", self.id);

        let mut ticker = interval(self.rules.broadcast_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let TickPlan { outbound, attackers, end } =
                        self.with_state(|s| s.plan_tick(Instant::now(), &self.rules))?;
                    self.send_all(outbound).await;
                    for attacker in attackers {
                        self.launch_attack(attacker).await;
                    }
                    if let Some(reason) = end {
                        return Ok(reason);
                    }
                }
                _ = self.wake.notified() => {
                    if let Some(TickPlan { outbound, end, .. }) =
                        self.with_state(|s| s.plan_interrupt())?
                    {
                        self.send_all(outbound).await;
                        if let Some(reason) = end {
                            return Ok(reason);
                        }
                    }
                }
            }
        }
    }

    fn participant(&self, seat: usize) -> Option<Arc<dyn Participant>> {
        self.participants
            .lock()
            .ok()
            .and_then(|p| p.as_ref().map(|p| p[seat].clone()))
    }

    /// Deliver to a seat; a failed delivery counts as that seat disconnecting
    async fn send_to(&self, seat: usize, message: Message) {
        let Some(participant) = self.participant(seat) else {
            return;
        };
        let tag = message.tag();
        if let Err(e) = participant.deliver(message).await {
            warn!(
                "Session {} - failed to deliver {} to '{}': {}",
                self.id,
                tag,
                participant.id(),
                e
            );
            if let Ok(true) = self.with_state(|s| s.mark_seat_disconnected(seat)) {
                self.wake.notify_one();
            }
        }
    }

    async fn send_all(&self, outbound: Vec<(usize, Message)>) {
        for (seat, message) in outbound {
            self.send_to(seat, message).await;
        }
    }

    async fn launch_attack(&self, attacker: usize) {
        let words = match self.content.hard_words(self.rules.attack_word_count).await {
            Ok(words) => words,
            Err(e) => {
                warn!("Session {} - no attack words available: {}", self.id, e);
                return;
            }
        };

        let attacker_id = self.participant_ids[attacker].clone();
        info!(
            "Session {} - '{}' attacks with {} words",
            self.id,
            attacker_id,
            words.len()
        );
        self.metrics.record_attack(self.mode);
        self.send_to(
            1 - attacker,
            Message::Attack {
                player_id: attacker_id,
                attack_words: words,
            },
        )
        .await;
    }

    async fn finish(&self, reason: EndReason) {
        let conclusion = match self.with_state(|s| {
            (s.phase() != SessionPhase::Ended).then(|| s.conclude(&reason, Instant::now()))
        }) {
            Ok(Some(conclusion)) => conclusion,
            Ok(None) => return,
            Err(e) => {
                error!("Session {} - failed to conclude: {}", self.id, e);
                return;
            }
        };
        self.phase_tx.send_replace(SessionPhase::Ended);

        let participants = match self.participants.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(participants) = participants {
            for (seat, message) in conclusion.outbound {
                let tag = message.tag();
                if let Err(e) = participants[seat].deliver(message).await {
                    debug!(
                        "Session {} - {} not delivered to '{}': {}",
                        self.id,
                        tag,
                        participants[seat].id(),
                        e
                    );
                }
            }
        }

        for result in conclusion.results {
            let participant_id = result.participant_id.clone();
            if let Err(e) = self.store.report_match_result(result).await {
                warn!(
                    "Session {} - failed to report result for '{}': {}",
                    self.id, participant_id, e
                );
                self.metrics.record_result_report_failure();
            }
        }

        if matches!(reason, EndReason::Eliminated { .. }) {
            self.metrics.record_elimination(self.mode);
        }
        self.metrics
            .record_race_ended(self.mode, reason.label(), conclusion.duration);

        let winner = conclusion.winner.map(|w| self.participant_ids[w].clone());
        info!(
            "Race {} ended - reason: {}, winner: {}, duration: {:.1}s",
            self.id,
            reason.label(),
            winner.as_deref().unwrap_or("none"),
            conclusion.duration.as_secs_f64()
        );

        self.events.session_ended(&SessionSummary {
            session_id: self.id,
            mode: self.mode,
            participants: self.participant_ids.clone(),
            reason,
            winner,
            duration: conclusion.duration,
        });
    }
}
