//! Simulated bot opponent
//!
//! A `BotSimulator` takes a race seat like any connection: messages reach it
//! through `deliver`, and it reports READY and progress through the session
//! handle it is attached to. Its pace comes from the difficulty's target WPM.

use crate::bot::difficulty::BotDifficulty;
use crate::error::{RaceError, Result};
use crate::metrics::MetricsCollector;
use crate::protocol::Message;
use crate::session::{Participant, SessionHandle, SessionPhase};
use crate::types::{ParticipantId, ParticipantKind, Progress};
use async_trait::async_trait;
use rand::Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Time to type one word at `target_wpm`, with five characters per word
pub fn word_delay(word_len: usize, target_wpm: f64) -> Duration {
    // (len / 5) / wpm minutes, expressed in seconds
    Duration::from_secs_f64(word_len as f64 * 12.0 / target_wpm)
}

/// Spread `base` uniformly by +/- `jitter`
pub fn jittered<R: Rng + ?Sized>(base: Duration, jitter: f64, rng: &mut R) -> Duration {
    if jitter <= 0.0 {
        return base;
    }
    base.mul_f64(rng.gen_range(1.0 - jitter..=1.0 + jitter))
}

pub struct BotSimulator {
    id: ParticipantId,
    difficulty: BotDifficulty,
    jitter: f64,
    metrics: Arc<MetricsCollector>,
    inbox_tx: mpsc::UnboundedSender<Message>,
    inbox_rx: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BotSimulator {
    pub fn new(
        id: ParticipantId,
        difficulty: BotDifficulty,
        jitter: f64,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            id,
            difficulty,
            jitter,
            metrics,
            inbox_tx,
            inbox_rx: Mutex::new(Some(inbox_rx)),
            task: Mutex::new(None),
        }
    }

    pub fn difficulty(&self) -> BotDifficulty {
        self.difficulty
    }
}

#[async_trait]
impl Participant for BotSimulator {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        self.difficulty.display_name()
    }

    fn kind(&self) -> ParticipantKind {
        ParticipantKind::Bot
    }

    async fn deliver(&self, message: Message) -> Result<()> {
        // Once the race loop has stopped the inbox is gone and nothing is listening
        if self.inbox_tx.send(message).is_err() {
            debug!("Bot '{}' inbox closed, message dropped", self.id);
        }
        Ok(())
    }

    fn attach(&self, session: SessionHandle) {
        let inbox = match self.inbox_rx.lock() {
            Ok(mut rx) => rx.take(),
            Err(_) => None,
        };
        let Some(inbox) = inbox else {
            warn!("Bot '{}' attached twice, ignoring", self.id);
            return;
        };

        let runner = BotRunner {
            id: self.id.clone(),
            target_wpm: self.difficulty.target_wpm(),
            jitter: self.jitter,
            session,
            inbox,
        };
        let active = ActiveBot::new(self.metrics.clone());

        let handle = tokio::spawn(async move {
            let _active = active;
            runner.run().await;
        });

        match self.task.lock() {
            Ok(mut task) => *task = Some(handle),
            Err(_) => handle.abort(),
        }
    }
}

impl Drop for BotSimulator {
    fn drop(&mut self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

/// Keeps the active-bot gauge up for as long as the race task lives
struct ActiveBot(Arc<MetricsCollector>);

impl ActiveBot {
    fn new(metrics: Arc<MetricsCollector>) -> Self {
        metrics.bot().active_bots.inc();
        Self(metrics)
    }
}

impl Drop for ActiveBot {
    fn drop(&mut self) {
        self.0.bot().active_bots.dec();
    }
}

struct BotRunner {
    id: ParticipantId,
    target_wpm: f64,
    jitter: f64,
    session: SessionHandle,
    inbox: mpsc::UnboundedReceiver<Message>,
}

impl BotRunner {
    async fn run(mut self) {
        let words = loop {
            match self.inbox.recv().await {
                Some(Message::GameStart { attack_words, .. }) => break attack_words,
                Some(_) => continue,
                None => return,
            }
        };

        if let Err(e) = self.session.on_ready(&self.id) {
            warn!("Bot '{}' could not report ready: {}", self.id, e);
            return;
        }

        let mut phase = self.session.subscribe();
        let current = match phase
            .wait_for(|p| *p != SessionPhase::AwaitingReady)
            .await
        {
            Ok(p) => *p,
            Err(_) => return,
        };
        if current != SessionPhase::InProgress {
            return;
        }

        info!(
            "Bot '{}' racing in session {} at {} WPM",
            self.id,
            self.session.id(),
            self.target_wpm
        );

        let started = Instant::now();
        let total = words.len() as u32;

        for (i, word) in words.iter().enumerate() {
            let delay = jittered(
                word_delay(word.chars().count(), self.target_wpm),
                self.jitter,
                &mut rand::thread_rng(),
            );

            // The only phase change after InProgress is Ended
            tokio::select! {
                _ = sleep(delay) => {}
                _ = phase.changed() => return,
            }

            // The bot ignores attacks and opponent updates
            while self.inbox.try_recv().is_ok() {}

            let completed = i as u32 + 1;
            let elapsed = started.elapsed();
            let minutes = elapsed.as_secs_f64() / 60.0;
            let wpm = if minutes > 0.0 {
                completed as f64 / minutes
            } else {
                0.0
            };

            let progress = Progress {
                wpm,
                accuracy: 100.0,
                words_completed: completed,
                total_words: total,
                current_word: words.get(i + 1).cloned().unwrap_or_default(),
                elapsed_time: elapsed.as_millis() as u64,
            };

            if let Err(e) = self.session.on_progress(&self.id, progress) {
                match e.downcast_ref::<RaceError>() {
                    Some(RaceError::RaceNotInProgress { .. }) => {}
                    _ => warn!("Bot '{}' progress rejected: {}", self.id, e),
                }
                return;
            }
        }

        debug!("Bot '{}' finished all {} words", self.id, total);
    }
}
