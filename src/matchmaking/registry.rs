//! Mode-aware matchmaking
//!
//! This module routes every connected player by game mode: practice gets a
//! word list straight away, VS_BOT is seated against a fresh bot, and the
//! human-vs-human modes wait in a FIFO pool until a second player arrives.

use crate::bot::{BotDifficulty, BotSimulator};
use crate::config::BotSettings;
use crate::error::{RaceError, Result};
use crate::metrics::MetricsCollector;
use crate::protocol::Message;
use crate::session::{Participant, SessionHandle, SessionLauncher};
use crate::types::GameMode;
use crate::utils::IdGenerator;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

type Pool = Mutex<VecDeque<Arc<dyn Participant>>>;

/// Where a player ended up after `enqueue`
pub enum EnqueueOutcome {
    /// Practice words were sent; no session exists
    Practice,
    /// Left in the mode's pool
    Waiting,
    /// Seated in a new race
    Matched(SessionHandle),
}

impl std::fmt::Debug for EnqueueOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnqueueOutcome::Practice => write!(f, "Practice"),
            EnqueueOutcome::Waiting => write!(f, "Waiting"),
            EnqueueOutcome::Matched(session) => write!(f, "Matched({})", session.id()),
        }
    }
}

/// Statistics about matchmaking operations
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// Total players routed
    pub players_enqueued: u64,
    /// Practice word lists handed out
    pub practice_started: u64,
    /// Races created against a bot
    pub bot_matches: u64,
    /// Races created from a pool
    pub pool_matches: u64,
    /// Players that left a pool before being matched
    pub players_withdrawn: u64,
}

pub struct MatchmakingRegistry {
    pools: HashMap<GameMode, Pool>,
    launcher: SessionLauncher,
    bot_ids: IdGenerator,
    bot_settings: BotSettings,
    metrics: Arc<MetricsCollector>,
    stats: RwLock<RegistryStats>,
}

impl MatchmakingRegistry {
    pub fn new(
        launcher: SessionLauncher,
        bot_settings: BotSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let pools = GameMode::POOLED
            .iter()
            .map(|mode| (*mode, Mutex::new(VecDeque::new())))
            .collect();

        Self {
            pools,
            launcher,
            bot_ids: IdGenerator::new("BOT-"),
            bot_settings,
            metrics,
            stats: RwLock::new(RegistryStats::default()),
        }
    }

    /// Route a freshly connected participant
    pub async fn enqueue(
        &self,
        mode: GameMode,
        participant: Arc<dyn Participant>,
        difficulty: Option<BotDifficulty>,
    ) -> Result<EnqueueOutcome> {
        let timer = self.metrics.start_timer();

        let outcome = match mode {
            GameMode::Practice => self.start_practice(participant.as_ref()).await?,
            GameMode::VsBot => self.start_bot_match(participant, difficulty),
            GameMode::VsFriend | GameMode::Elimination => {
                self.join_pool(mode, participant).await?
            }
        };

        self.metrics.record_enqueue(mode, timer.stop());
        self.update_stats(|stats| {
            stats.players_enqueued += 1;
            match (&outcome, mode) {
                (EnqueueOutcome::Practice, _) => stats.practice_started += 1,
                (EnqueueOutcome::Matched(_), GameMode::VsBot) => stats.bot_matches += 1,
                (EnqueueOutcome::Matched(_), _) => stats.pool_matches += 1,
                (EnqueueOutcome::Waiting, _) => {}
            }
        });

        Ok(outcome)
    }

    /// Remove a participant that is still waiting; false if it was not pooled
    pub fn withdraw(&self, mode: GameMode, participant_id: &str) -> bool {
        let Some(pool) = self.pools.get(&mode) else {
            return false;
        };

        let (removed, waiting) = match pool.lock() {
            Ok(mut queue) => {
                let before = queue.len();
                queue.retain(|p| p.id() != participant_id);
                (queue.len() != before, queue.len())
            }
            Err(_) => {
                warn!("{} pool lock poisoned during withdraw", mode);
                return false;
            }
        };

        if removed {
            self.metrics.set_players_waiting(mode, waiting);
            self.update_stats(|stats| stats.players_withdrawn += 1);
            debug!("'{}' withdrawn from {} pool", participant_id, mode);
        }
        removed
    }

    /// Number of participants waiting in a mode's pool
    pub fn waiting(&self, mode: GameMode) -> usize {
        self.pools
            .get(&mode)
            .and_then(|pool| pool.lock().ok().map(|queue| queue.len()))
            .unwrap_or(0)
    }

    /// Waiting participants across every pool
    pub fn total_waiting(&self) -> usize {
        GameMode::POOLED.iter().map(|mode| self.waiting(*mode)).sum()
    }

    pub fn stats(&self) -> RegistryStats {
        self.stats
            .read()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    fn update_stats(&self, f: impl FnOnce(&mut RegistryStats)) {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats);
        }
    }

    async fn start_practice(&self, participant: &dyn Participant) -> Result<EnqueueOutcome> {
        let words = self
            .launcher
            .content()
            .word_list(self.launcher.rules().word_count)
            .await?;

        info!(
            "Practice started for '{}' with {} words",
            participant.id(),
            words.len()
        );

        participant
            .deliver(Message::GameStart {
                player_id: participant.id().to_string(),
                game_mode: GameMode::Practice,
                attack_words: words,
                player_name: None,
            })
            .await?;

        Ok(EnqueueOutcome::Practice)
    }

    fn start_bot_match(
        &self,
        participant: Arc<dyn Participant>,
        difficulty: Option<BotDifficulty>,
    ) -> EnqueueOutcome {
        let difficulty = difficulty.unwrap_or(self.bot_settings.default_difficulty);
        let bot: Arc<dyn Participant> = Arc::new(BotSimulator::new(
            self.bot_ids.next_id(),
            difficulty,
            self.bot_settings.jitter,
            self.metrics.clone(),
        ));
        self.metrics.record_bot_spawned(difficulty);

        info!(
            "Matching '{}' against {} '{}'",
            participant.id(),
            difficulty.display_name(),
            bot.id()
        );

        let session = self.launcher.launch(GameMode::VsBot, [participant, bot]);
        self.metrics.record_match_created(GameMode::VsBot);
        EnqueueOutcome::Matched(session)
    }

    async fn join_pool(
        &self,
        mode: GameMode,
        participant: Arc<dyn Participant>,
    ) -> Result<EnqueueOutcome> {
        let pool = self.pools.get(&mode).ok_or_else(|| RaceError::InternalError {
            message: format!("no pool for mode {}", mode),
        })?;

        // Push and pair under one lock so two arrivals can never both wait
        let (pair, waiting) = {
            let mut queue = pool
                .lock()
                .map_err(|_| RaceError::lock_poisoned("matchmaking pool"))?;
            queue.push_back(participant.clone());

            let pair = if queue.len() >= 2 {
                match (queue.pop_front(), queue.pop_front()) {
                    (Some(first), Some(second)) => Some([first, second]),
                    _ => None,
                }
            } else {
                None
            };
            (pair, queue.len())
        };
        self.metrics.set_players_waiting(mode, waiting);

        match pair {
            Some(players) => {
                info!(
                    "Paired '{}' with '{}' for {}",
                    players[0].id(),
                    players[1].id(),
                    mode
                );
                let session = self.launcher.launch(mode, players);
                self.metrics.record_match_created(mode);
                Ok(EnqueueOutcome::Matched(session))
            }
            None => {
                debug!("'{}' waiting in {} pool", participant.id(), mode);
                if let Err(e) = participant.deliver(Message::waiting_notice()).await {
                    warn!(
                        "Could not send waiting notice to '{}': {}",
                        participant.id(),
                        e
                    );
                }
                Ok(EnqueueOutcome::Waiting)
            }
        }
    }
}
