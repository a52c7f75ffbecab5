//! Match result reporting
//!
//! Results are handed to an external score store once per participant when a
//! race ends. Reporting is best-effort: a failing store is logged by the
//! caller and never changes the outcome of a race.

use crate::error::{RaceError, Result};
use crate::types::{GameMode, ParticipantId, ParticipantKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::info;

/// Final figures for one participant of one race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub participant_id: ParticipantId,
    pub participant_name: String,
    pub kind: ParticipantKind,
    pub wpm: f64,
    pub accuracy: f64,
    pub words_typed: u32,
    pub duration_ms: u64,
    pub mode: GameMode,
    pub won: bool,
    pub finished_at: DateTime<Utc>,
}

/// Sink for finished-race results
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn report_match_result(&self, result: MatchResult) -> Result<()>;
}

/// Store that keeps results in memory
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    results: Mutex<Vec<MatchResult>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far
    pub fn results(&self) -> Vec<MatchResult> {
        self.results
            .lock()
            .map(|results| results.clone())
            .unwrap_or_default()
    }

    /// Results reported for one participant
    pub fn results_for(&self, participant_id: &str) -> Vec<MatchResult> {
        self.results()
            .into_iter()
            .filter(|r| r.participant_id == participant_id)
            .collect()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn report_match_result(&self, result: MatchResult) -> Result<()> {
        info!(
            "Recording result - participant: '{}', mode: {}, wpm: {:.1}, accuracy: {:.1}%, words: {}, won: {}",
            result.participant_id, result.mode, result.wpm, result.accuracy, result.words_typed, result.won
        );

        let mut results = self
            .results
            .lock()
            .map_err(|_| RaceError::lock_poisoned("results"))?;
        results.push(result);
        Ok(())
    }
}
