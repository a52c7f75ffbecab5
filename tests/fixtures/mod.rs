//! Test fixtures and mock implementations for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use race_room::config::AppConfig;
use race_room::content::ContentSource;
use race_room::error::{RaceError, Result};
use race_room::metrics::MetricsCollector;
use race_room::session::{SessionHandle, SessionPhase};
use race_room::store::{MatchResult, ResultStore};
use race_room::{Coordinator, GameMode, MemoryClient, Message, Progress, Transport};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Words every race is played with, cycled to the requested length
pub const RACE_WORDS: &[&str] = &["alpha", "bravo", "charlie", "delta", "echo"];

/// Words handed out by attacks
pub const ATTACK_WORDS: &[&str] = &["xylophone", "quizzical", "juxtapose"];

/// Content source with a predictable word list
#[derive(Debug, Default)]
pub struct FixedContentSource;

#[async_trait]
impl ContentSource for FixedContentSource {
    async fn word_list(&self, count: usize) -> Result<Vec<String>> {
        Ok(RACE_WORDS
            .iter()
            .cycle()
            .take(count)
            .map(|w| w.to_string())
            .collect())
    }

    async fn hard_words(&self, count: usize) -> Result<Vec<String>> {
        Ok(ATTACK_WORDS
            .iter()
            .cycle()
            .take(count)
            .map(|w| w.to_string())
            .collect())
    }
}

/// Result store that keeps everything it is given
#[derive(Debug, Default)]
pub struct RecordingResultStore {
    results: Mutex<Vec<MatchResult>>,
    reported: Notify,
}

impl RecordingResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<MatchResult> {
        self.results
            .lock()
            .map(|results| results.clone())
            .unwrap_or_default()
    }

    pub fn result_for(&self, participant_id: &str) -> Option<MatchResult> {
        self.results()
            .into_iter()
            .find(|r| r.participant_id == participant_id)
    }

    /// Wait until at least `count` results have been reported
    pub async fn wait_for(&self, count: usize) -> Vec<MatchResult> {
        loop {
            let notified = self.reported.notified();
            let results = self.results();
            if results.len() >= count {
                return results;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl ResultStore for RecordingResultStore {
    async fn report_match_result(&self, result: MatchResult) -> Result<()> {
        if let Ok(mut results) = self.results.lock() {
            results.push(result);
        }
        self.reported.notify_waiters();
        Ok(())
    }
}

/// Result store that is always down
#[derive(Debug, Default)]
pub struct FailingResultStore;

#[async_trait]
impl ResultStore for FailingResultStore {
    async fn report_match_result(&self, _result: MatchResult) -> Result<()> {
        Err(RaceError::InternalError {
            message: "score service offline".to_string(),
        }
        .into())
    }
}

/// Configuration with short races over `word_count` words
pub fn test_config(word_count: usize) -> AppConfig {
    let mut config = AppConfig::default();
    config.race.word_count = word_count;
    config.race.broadcast_interval_ms = 100;
    config.race.ready_poll_ms = 50;
    config.race.max_duration_seconds = 60;
    config.service.handshake_timeout_seconds = 2;
    config
}

/// A coordinator over fixed content and a recording store
pub struct TestServer {
    pub coordinator: Arc<Coordinator>,
    pub store: Arc<RecordingResultStore>,
    pub metrics: Arc<MetricsCollector>,
}

impl TestServer {
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(RecordingResultStore::new());
        let metrics = Arc::new(MetricsCollector::new().expect("metrics registry"));
        let coordinator = Arc::new(Coordinator::new(
            config,
            Arc::new(FixedContentSource),
            store.clone(),
            metrics.clone(),
        ));

        Self {
            coordinator,
            store,
            metrics,
        }
    }

    pub fn with_words(word_count: usize) -> Self {
        Self::new(test_config(word_count))
    }

    /// Open a connection without sending anything
    pub fn open(&self) -> MemoryClient {
        let (transport, client) = Transport::memory();
        self.coordinator.accept(transport);
        client
    }

    /// Open a connection and send CONNECT
    pub fn join(&self, name: &str, mode: GameMode) -> MemoryClient {
        let client = self.open();
        client
            .send(&connect(name, mode.as_str()))
            .expect("send CONNECT");
        client
    }

    pub fn join_bot(&self, name: &str, difficulty: &str) -> MemoryClient {
        let client = self.open();
        client
            .send(&Message::Connect {
                player_name: name.to_string(),
                game_mode: Some("VS_BOT".to_string()),
                difficulty: Some(difficulty.to_string()),
            })
            .expect("send CONNECT");
        client
    }

    /// The only live session
    pub fn single_session(&self) -> SessionHandle {
        let sessions = self.coordinator.sessions().snapshot();
        assert_eq!(sessions.len(), 1, "expected exactly one live session");
        sessions.into_iter().next().expect("one session")
    }
}

pub fn connect(name: &str, mode: &str) -> Message {
    Message::Connect {
        player_name: name.to_string(),
        game_mode: Some(mode.to_string()),
        difficulty: None,
    }
}

pub fn progress(words_completed: u32, wpm: f64, accuracy: f64) -> Message {
    Message::ProgressUpdate {
        progress: Progress {
            wpm,
            accuracy,
            words_completed,
            total_words: 0,
            current_word: String::new(),
            elapsed_time: 1_000,
        },
    }
}

/// What a player learns from GAME_START
#[derive(Debug, Clone)]
pub struct Start {
    pub player_id: String,
    pub mode: GameMode,
    pub words: Vec<String>,
    pub opponent: Option<String>,
}

/// Skip ahead to GAME_START
pub async fn expect_game_start(client: &mut MemoryClient) -> Start {
    match recv_until(client, |m| matches!(m, Message::GameStart { .. })).await {
        Message::GameStart {
            player_id,
            game_mode,
            attack_words,
            player_name,
        } => Start {
            player_id,
            mode: game_mode,
            words: attack_words,
            opponent: player_name,
        },
        other => panic!("expected GAME_START, got {:?}", other),
    }
}

/// Skip ahead to the first message matching `pred`, failing after a while
pub async fn recv_until<F>(client: &mut MemoryClient, pred: F) -> Message
where
    F: FnMut(&Message) -> bool,
{
    tokio::time::timeout(Duration::from_secs(120), client.recv_until(pred))
        .await
        .expect("timed out waiting for message")
        .expect("connection closed before the expected message")
}

/// Next GAME_END or GAME_OVER
pub async fn expect_race_over(client: &mut MemoryClient) -> Message {
    recv_until(client, |m| {
        matches!(m, Message::GameEnd { .. } | Message::GameOver { .. })
    })
    .await
}

/// Wait until the session has left the ready phase
pub async fn wait_in_progress(session: &SessionHandle) {
    let mut phase = session.subscribe();
    let reached = phase
        .wait_for(|p| *p != SessionPhase::AwaitingReady)
        .await
        .map(|p| *p)
        .expect("session dropped its phase channel");
    assert_eq!(reached, SessionPhase::InProgress);
}

/// Two players in one pooled race, both ready and racing
pub struct Match {
    pub first: MemoryClient,
    pub second: MemoryClient,
    pub first_start: Start,
    pub second_start: Start,
    pub session: SessionHandle,
}

pub async fn start_match(server: &TestServer, mode: GameMode) -> Match {
    let mut first = server.join("alice", mode);
    let mut second = server.join("bob", mode);

    let first_start = expect_game_start(&mut first).await;
    let second_start = expect_game_start(&mut second).await;
    let session = server.single_session();

    first.send(&Message::Ready).expect("send READY");
    second.send(&Message::Ready).expect("send READY");
    wait_in_progress(&session).await;

    Match {
        first,
        second,
        first_start,
        second_start,
        session,
    }
}
