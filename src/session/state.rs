//! Race state and per-tick rule evaluation
//!
//! `RaceState` holds everything a session knows about its two seats. It does
//! no I/O: every decision returns the messages to send, and the owning
//! `RaceSession` delivers them after releasing its lock. One tick's
//! HEALTH_UPDATE and OPPONENT_PROGRESS messages therefore come from a single
//! consistent view of the state.

use crate::config::RaceSettings;
use crate::error::{RaceError, Result};
use crate::protocol::{Message, TIE_WINNER_ID};
use crate::session::health::{DamageOutcome, HealthState};
use crate::session::winner::{describe, resolve, Standing, Verdict};
use crate::store::MatchResult;
use crate::types::{GameMode, ParticipantId, ParticipantKind, Progress, SessionId};
use crate::utils::current_timestamp;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle of a race; `Ended` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    AwaitingReady,
    InProgress,
    Ended,
}

/// Why a race ended. Seats are indices 0 and 1.
#[derive(Debug, Clone, PartialEq)]
pub enum EndReason {
    Completed,
    TimedOut,
    Eliminated { loser: usize },
    Disconnected { leaver: usize },
    Cancelled { reason: String },
}

impl EndReason {
    /// Short label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            EndReason::Completed => "completed",
            EndReason::TimedOut => "timed_out",
            EndReason::Eliminated { .. } => "eliminated",
            EndReason::Disconnected { .. } => "disconnected",
            EndReason::Cancelled { .. } => "cancelled",
        }
    }
}

/// Identity of a participant taking a seat
#[derive(Debug, Clone)]
pub struct SeatInfo {
    pub id: ParticipantId,
    pub name: String,
    pub kind: ParticipantKind,
}

#[derive(Debug)]
struct Seat {
    info: SeatInfo,
    ready: bool,
    connected: bool,
    progress: Option<Progress>,
    health: Option<HealthState>,
    attacked: bool,
    /// Index of the word the next validation is checked against
    cursor: usize,
    /// Validations received since the last tick
    pending: Vec<String>,
}

impl Seat {
    fn new(info: SeatInfo, health: Option<HealthState>) -> Self {
        Self {
            info,
            ready: false,
            connected: true,
            progress: None,
            health,
            attacked: false,
            cursor: 0,
            pending: Vec::new(),
        }
    }
}

/// A message addressed to one seat
pub type Outbound = (usize, Message);

/// What a tick decided
#[derive(Debug, Default)]
pub struct TickPlan {
    pub outbound: Vec<Outbound>,
    /// Seats whose attack fired this tick
    pub attackers: Vec<usize>,
    pub end: Option<EndReason>,
}

/// Final messages and results of a race
#[derive(Debug)]
pub struct Conclusion {
    pub outbound: Vec<Outbound>,
    pub winner: Option<usize>,
    pub results: Vec<MatchResult>,
    pub duration: Duration,
}

pub struct RaceState {
    session_id: SessionId,
    mode: GameMode,
    phase: SessionPhase,
    words: Vec<String>,
    seats: [Seat; 2],
    started_at: Option<Instant>,
    cancelled: Option<String>,
}

impl RaceState {
    pub fn new(session_id: SessionId, mode: GameMode, seats: [SeatInfo; 2], initial_health: u32) -> Self {
        let health = || {
            mode.has_health_system()
                .then(|| HealthState::new(initial_health))
        };
        let [a, b] = seats;

        Self {
            session_id,
            mode,
            phase: SessionPhase::AwaitingReady,
            words: Vec::new(),
            seats: [Seat::new(a, health()), Seat::new(b, health())],
            started_at: None,
            cancelled: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn seat_id(&self, seat: usize) -> &str {
        &self.seats[seat].info.id
    }

    pub fn progress(&self, seat: usize) -> Option<&Progress> {
        self.seats[seat].progress.as_ref()
    }

    pub fn health(&self, seat: usize) -> Option<&HealthState> {
        self.seats[seat].health.as_ref()
    }

    pub fn has_attacked(&self, seat: usize) -> bool {
        self.seats[seat].attacked
    }

    fn seat_of(&self, participant_id: &str) -> Result<usize> {
        self.seats
            .iter()
            .position(|s| s.info.id == participant_id)
            .ok_or_else(|| {
                RaceError::InternalError {
                    message: format!(
                        "participant '{}' is not seated in session {}",
                        participant_id, self.session_id
                    ),
                }
                .into()
            })
    }

    fn require_in_progress(&self) -> Result<()> {
        if self.phase != SessionPhase::InProgress {
            return Err(RaceError::RaceNotInProgress {
                session_id: self.session_id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Store the shared word list and build each seat's GAME_START
    pub fn install_words(&mut self, words: Vec<String>) -> [Outbound; 2] {
        self.words = words;
        let start = |seat: usize| {
            (
                seat,
                Message::GameStart {
                    player_id: self.seats[seat].info.id.clone(),
                    game_mode: self.mode,
                    attack_words: self.words.clone(),
                    player_name: Some(self.seats[1 - seat].info.name.clone()),
                },
            )
        };
        [start(0), start(1)]
    }

    /// Record READY; repeated or late READY is harmless
    pub fn mark_ready(&mut self, participant_id: &str) -> Result<()> {
        let seat = self.seat_of(participant_id)?;
        if self.phase == SessionPhase::AwaitingReady {
            self.seats[seat].ready = true;
        }
        Ok(())
    }

    pub fn both_ready(&self) -> bool {
        self.seats.iter().all(|s| s.ready)
    }

    /// Returns whether the seat was connected until now
    pub fn mark_disconnected(&mut self, participant_id: &str) -> bool {
        match self.seat_of(participant_id) {
            Ok(seat) => std::mem::replace(&mut self.seats[seat].connected, false),
            Err(_) => false,
        }
    }

    pub fn mark_seat_disconnected(&mut self, seat: usize) -> bool {
        std::mem::replace(&mut self.seats[seat].connected, false)
    }

    pub fn cancel(&mut self, reason: String) {
        if self.cancelled.is_none() {
            self.cancelled = Some(reason);
        }
    }

    pub fn begin(&mut self, now: Instant) {
        self.phase = SessionPhase::InProgress;
        self.started_at = Some(now);
    }

    /// Accept a progress report after validating it against the last one
    pub fn record_progress(&mut self, participant_id: &str, progress: Progress) -> Result<()> {
        let seat = self.seat_of(participant_id)?;
        self.require_in_progress()?;
        progress.validate_after(self.seats[seat].progress.as_ref())?;
        self.seats[seat].progress = Some(progress);
        Ok(())
    }

    /// Queue a typed word for evaluation at the next tick
    pub fn queue_validation(&mut self, participant_id: &str, typed_word: String) -> Result<()> {
        let seat = self.seat_of(participant_id)?;
        self.require_in_progress()?;
        if self.mode.has_health_system() {
            self.seats[seat].pending.push(typed_word);
        }
        Ok(())
    }

    /// End conditions that do not wait for a tick
    pub fn interrupt(&self) -> Option<EndReason> {
        if let Some(reason) = &self.cancelled {
            return Some(EndReason::Cancelled {
                reason: reason.clone(),
            });
        }
        self.seats
            .iter()
            .position(|s| !s.connected)
            .map(|leaver| EndReason::Disconnected { leaver })
    }

    /// Settle an interrupt noticed between ticks
    ///
    /// Typed words queued before the interrupt are applied first, and an
    /// elimination among them decides the race instead. `None` when nothing
    /// interrupted the race.
    pub fn plan_interrupt(&mut self) -> Option<TickPlan> {
        let reason = self.interrupt()?;
        let mut outbound = Vec::new();
        let end = match self.apply_validations(&mut outbound) {
            Some(loser) => EndReason::Eliminated { loser },
            None => reason,
        };
        Some(TickPlan {
            outbound,
            attackers: Vec::new(),
            end: Some(end),
        })
    }

    /// Evaluate one broadcast tick
    pub fn plan_tick(&mut self, now: Instant, rules: &RaceSettings) -> TickPlan {
        let mut plan = TickPlan::default();

        // Elimination takes priority over every other end condition
        if let Some(loser) = self.apply_validations(&mut plan.outbound) {
            plan.end = Some(EndReason::Eliminated { loser });
            return plan;
        }

        if let Some(reason) = self.interrupt() {
            plan.end = Some(reason);
            return plan;
        }

        for seat in 0..2 {
            if let Some(progress) = &self.seats[seat].progress {
                plan.outbound.push((
                    1 - seat,
                    Message::OpponentProgress {
                        player_id: self.seats[seat].info.id.clone(),
                        player_name: self.seats[seat].info.name.clone(),
                        progress: progress.clone(),
                    },
                ));
            }
        }

        if self.mode.has_attack_mechanic() {
            for seat in 0..2 {
                let s = &mut self.seats[seat];
                let fast = s
                    .progress
                    .as_ref()
                    .is_some_and(|p| p.wpm >= rules.attack_wpm_threshold);
                if fast && !s.attacked {
                    s.attacked = true;
                    plan.attackers.push(seat);
                }
            }
        }

        let total = self.words.len() as u32;
        let finished = total > 0
            && self
                .seats
                .iter()
                .any(|s| s.progress.as_ref().is_some_and(|p| p.words_completed >= total));

        if finished {
            plan.end = Some(EndReason::Completed);
        } else if self
            .started_at
            .is_some_and(|start| now.duration_since(start) > rules.max_duration())
        {
            plan.end = Some(EndReason::TimedOut);
        }

        plan
    }

    /// Drain queued validations; returns the first seat eliminated
    fn apply_validations(&mut self, outbound: &mut Vec<Outbound>) -> Option<usize> {
        let mut first_eliminated = None;

        for seat in 0..2 {
            let pending = std::mem::take(&mut self.seats[seat].pending);
            for typed in pending {
                let s = &mut self.seats[seat];
                let Some(expected) = self.words.get(s.cursor) else {
                    break;
                };
                s.cursor += 1;

                let Some(health) = s.health.as_mut() else {
                    continue;
                };
                let correct = typed.trim().to_lowercase() == expected.trim().to_lowercase();

                if correct {
                    outbound.push((seat, health_update(&s.info.id, health, true)));
                    continue;
                }

                match health.take_hit() {
                    DamageOutcome::AlreadyEliminated => break,
                    outcome => {
                        let update = health_update(&s.info.id, health, false);
                        outbound.push((seat, update.clone()));
                        outbound.push((1 - seat, update));
                        if outcome == DamageOutcome::Eliminated {
                            first_eliminated.get_or_insert(seat);
                            break;
                        }
                    }
                }
            }
        }

        first_eliminated
    }

    /// Enter `Ended` and work out the closing messages and results
    pub fn conclude(&mut self, reason: &EndReason, now: Instant) -> Conclusion {
        self.phase = SessionPhase::Ended;

        let duration = self
            .started_at
            .map(|start| now.duration_since(start))
            .unwrap_or_default();
        let standings = [
            Standing::from(self.seats[0].progress.as_ref()),
            Standing::from(self.seats[1].progress.as_ref()),
        ];

        let mut outbound = Vec::new();
        let winner = match reason {
            EndReason::Completed | EndReason::TimedOut => {
                let prefix = if *reason == EndReason::TimedOut {
                    "Time's up! "
                } else {
                    ""
                };
                match resolve(&standings[0], &standings[1]) {
                    Verdict::Winner { seat, decider } => {
                        let message = format!(
                            "{}{} wins! {}",
                            prefix,
                            self.seats[seat].info.name,
                            describe(decider, &standings[seat], &standings[1 - seat])
                        );
                        self.push_game_end(&mut outbound, Some(seat), &message);
                        Some(seat)
                    }
                    Verdict::Tie => {
                        let message =
                            format!("{}It's a tie! Both players had identical scores!", prefix);
                        for seat in 0..2 {
                            outbound.push((
                                seat,
                                Message::GameEnd {
                                    winner_id: Some(TIE_WINNER_ID.to_string()),
                                    message: message.clone(),
                                },
                            ));
                        }
                        None
                    }
                }
            }
            EndReason::Eliminated { loser } => {
                let winner = 1 - loser;
                outbound.push((
                    *loser,
                    Message::GameOver {
                        message: "You have been eliminated! No health remaining.".to_string(),
                    },
                ));
                outbound.push((
                    winner,
                    Message::GameEnd {
                        winner_id: Some(self.seats[winner].info.id.clone()),
                        message: format!(
                            "{} wins! Opponent eliminated.",
                            self.seats[winner].info.name
                        ),
                    },
                ));
                Some(winner)
            }
            EndReason::Disconnected { leaver } => {
                let winner = 1 - leaver;
                outbound.push((
                    winner,
                    Message::GameEnd {
                        winner_id: Some(self.seats[winner].info.id.clone()),
                        message: "Opponent disconnected. You win!".to_string(),
                    },
                ));
                Some(winner)
            }
            EndReason::Cancelled { reason } => {
                self.push_game_end(&mut outbound, None, reason);
                None
            }
        };

        // Races that never started have nothing to report
        let results = if self.started_at.is_some() {
            let finished_at = current_timestamp();
            self.seats
                .iter()
                .enumerate()
                .map(|(i, s)| MatchResult {
                    participant_id: s.info.id.clone(),
                    participant_name: s.info.name.clone(),
                    kind: s.info.kind,
                    wpm: standings[i].wpm,
                    accuracy: standings[i].accuracy,
                    words_typed: standings[i].words_completed,
                    duration_ms: duration.as_millis() as u64,
                    mode: self.mode,
                    won: winner == Some(i),
                    finished_at,
                })
                .collect()
        } else {
            Vec::new()
        };

        Conclusion {
            outbound,
            winner,
            results,
            duration,
        }
    }

    fn push_game_end(&self, outbound: &mut Vec<Outbound>, winner: Option<usize>, message: &str) {
        for seat in 0..2 {
            outbound.push((
                seat,
                Message::GameEnd {
                    winner_id: winner.map(|w| self.seats[w].info.id.clone()),
                    message: message.to_string(),
                },
            ));
        }
    }
}

fn health_update(player_id: &str, health: &HealthState, word_correct: bool) -> Message {
    Message::HealthUpdate {
        player_id: player_id.to_string(),
        health: health.current(),
        max_health: health.max(),
        word_correct,
    }
}
