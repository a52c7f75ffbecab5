//! Wire messages exchanged with players
//!
//! Every frame is a JSON object whose `type` field selects the variant. Only
//! the fields relevant to a variant are present, using the camelCase names of
//! the shared envelope (`playerId`, `attackWords`, `winnerId`, ...).

use crate::types::{GameMode, Progress};
use serde::{Deserialize, Serialize};

/// Text of the informational notice sent to players left in a pool
pub const WAITING_NOTICE: &str = "Waiting for opponent to connect...";

/// `winnerId` of a GAME_END for a race that ended level
pub const TIE_WINNER_ID: &str = "TIE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Message {
    /// First frame of every connection
    Connect {
        #[serde(default)]
        player_name: String,
        /// Kept as text so an unknown mode can fall back instead of failing
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game_mode: Option<String>,
        /// Bot difficulty, only meaningful for VS_BOT
        #[serde(default, skip_serializing_if = "Option::is_none")]
        difficulty: Option<String>,
    },
    Ready,
    ProgressUpdate {
        progress: Progress,
    },
    /// A word the player finished typing, checked in elimination mode
    WordValidation {
        typed_word: String,
    },
    HealthUpdate {
        player_id: String,
        health: u32,
        max_health: u32,
        word_correct: bool,
    },
    Attack {
        /// The attacker
        player_id: String,
        attack_words: Vec<String>,
    },
    OpponentProgress {
        player_id: String,
        player_name: String,
        progress: Progress,
    },
    /// Carries the race word list in `attackWords`
    GameStart {
        player_id: String,
        game_mode: GameMode,
        attack_words: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_name: Option<String>,
    },
    GameOver {
        message: String,
    },
    GameEnd {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        winner_id: Option<String>,
        message: String,
    },
    Disconnect,
    Error {
        message: String,
    },
}

impl Message {
    /// Wire tag of the message
    pub fn tag(&self) -> &'static str {
        match self {
            Message::Connect { .. } => "CONNECT",
            Message::Ready => "READY",
            Message::ProgressUpdate { .. } => "PROGRESS_UPDATE",
            Message::WordValidation { .. } => "WORD_VALIDATION",
            Message::HealthUpdate { .. } => "HEALTH_UPDATE",
            Message::Attack { .. } => "ATTACK",
            Message::OpponentProgress { .. } => "OPPONENT_PROGRESS",
            Message::GameStart { .. } => "GAME_START",
            Message::GameOver { .. } => "GAME_OVER",
            Message::GameEnd { .. } => "GAME_END",
            Message::Disconnect => "DISCONNECT",
            Message::Error { .. } => "ERROR",
        }
    }

    /// Whether a client is allowed to send this message
    pub fn is_client_message(&self) -> bool {
        matches!(
            self,
            Message::Connect { .. }
                | Message::Ready
                | Message::ProgressUpdate { .. }
                | Message::WordValidation { .. }
                | Message::Disconnect
        )
    }

    pub fn error(message: impl Into<String>) -> Self {
        Message::Error {
            message: message.into(),
        }
    }

    pub fn waiting_notice() -> Self {
        Message::error(WAITING_NOTICE)
    }
}
