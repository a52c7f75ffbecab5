//! Common types used throughout the race coordinator

use crate::error::{RaceError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for connected players and bots
pub type ParticipantId = String;

/// Unique identifier for race sessions
pub type SessionId = Uuid;

/// Game mode requested by a player on connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameMode {
    Practice,
    VsBot,
    VsFriend,
    Elimination,
}

impl GameMode {
    /// All modes, in wire order
    pub const ALL: [GameMode; 4] = [
        GameMode::Practice,
        GameMode::VsBot,
        GameMode::VsFriend,
        GameMode::Elimination,
    ];

    /// Modes that pair two waiting humans through a pool
    pub const POOLED: [GameMode; 2] = [GameMode::VsFriend, GameMode::Elimination];

    /// Whether the mode races two participants against each other
    pub fn is_multiplayer(&self) -> bool {
        !matches!(self, GameMode::Practice)
    }

    /// Whether mistyped words cost health
    pub fn has_health_system(&self) -> bool {
        matches!(self, GameMode::Elimination)
    }

    /// Whether fast typists send attack words to their opponent
    pub fn has_attack_mechanic(&self) -> bool {
        matches!(self, GameMode::Elimination)
    }

    /// Whether players wait in a FIFO pool for a human opponent
    pub fn is_pooled(&self) -> bool {
        matches!(self, GameMode::VsFriend | GameMode::Elimination)
    }

    /// Wire name of the mode, also used as a metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Practice => "PRACTICE",
            GameMode::VsBot => "VS_BOT",
            GameMode::VsFriend => "VS_FRIEND",
            GameMode::Elimination => "ELIMINATION",
        }
    }
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = RaceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRACTICE" => Ok(GameMode::Practice),
            "VS_BOT" => Ok(GameMode::VsBot),
            "VS_FRIEND" => Ok(GameMode::VsFriend),
            "ELIMINATION" => Ok(GameMode::Elimination),
            other => Err(RaceError::InvalidMessage {
                reason: format!("unknown game mode '{}'", other),
            }),
        }
    }
}

/// Type of participant seated in a race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantKind {
    Human,
    Bot,
}

impl std::fmt::Display for ParticipantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParticipantKind::Human => write!(f, "human"),
            ParticipantKind::Bot => write!(f, "bot"),
        }
    }
}

/// A participant's self-reported typing progress
///
/// The coordinator never rewrites a report; it only validates it and relays
/// it to the opponent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Progress {
    pub wpm: f64,
    pub accuracy: f64,
    pub words_completed: u32,
    pub total_words: u32,
    pub current_word: String,
    /// Milliseconds since the race started
    pub elapsed_time: u64,
}

impl Progress {
    /// Check the value ranges of a single report
    pub fn validate(&self) -> Result<()> {
        if !self.wpm.is_finite() || self.wpm < 0.0 {
            return Err(RaceError::InvalidProgress {
                reason: format!("wpm must be a non-negative number, got {}", self.wpm),
            }
            .into());
        }
        if !self.accuracy.is_finite() || !(0.0..=100.0).contains(&self.accuracy) {
            return Err(RaceError::InvalidProgress {
                reason: format!("accuracy must be within 0-100, got {}", self.accuracy),
            }
            .into());
        }
        Ok(())
    }

    /// Check that this report may follow `previous` from the same participant
    pub fn validate_after(&self, previous: Option<&Progress>) -> Result<()> {
        self.validate()?;
        if let Some(previous) = previous {
            if self.words_completed < previous.words_completed {
                return Err(RaceError::InvalidProgress {
                    reason: format!(
                        "wordsCompleted went backwards ({} -> {})",
                        previous.words_completed, self.words_completed
                    ),
                }
                .into());
            }
        }
        Ok(())
    }
}
