//! Bot difficulty levels

use crate::error::RaceError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BotDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    Expert,
}

impl BotDifficulty {
    /// Typing speed the bot aims for
    pub fn target_wpm(&self) -> f64 {
        match self {
            BotDifficulty::Easy => 30.0,
            BotDifficulty::Medium => 50.0,
            BotDifficulty::Hard => 70.0,
            BotDifficulty::Expert => 90.0,
        }
    }

    /// Name shown to the opponent
    pub fn display_name(&self) -> &'static str {
        match self {
            BotDifficulty::Easy => "Easy Bot",
            BotDifficulty::Medium => "Medium Bot",
            BotDifficulty::Hard => "Hard Bot",
            BotDifficulty::Expert => "Expert Bot",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BotDifficulty::Easy => "easy",
            BotDifficulty::Medium => "medium",
            BotDifficulty::Hard => "hard",
            BotDifficulty::Expert => "expert",
        }
    }
}

impl FromStr for BotDifficulty {
    type Err = RaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EASY" => Ok(BotDifficulty::Easy),
            "MEDIUM" => Ok(BotDifficulty::Medium),
            "HARD" => Ok(BotDifficulty::Hard),
            "EXPERT" => Ok(BotDifficulty::Expert),
            other => Err(RaceError::InvalidMessage {
                reason: format!("unknown bot difficulty '{}'", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_speeds() {
        assert_eq!(BotDifficulty::Easy.target_wpm(), 30.0);
        assert_eq!(BotDifficulty::default(), BotDifficulty::Medium);
        assert_eq!(BotDifficulty::Expert.display_name(), "Expert Bot");
    }

    #[test]
    fn test_difficulty_parsing() {
        assert_eq!("hard".parse::<BotDifficulty>().unwrap(), BotDifficulty::Hard);
        assert!("nightmare".parse::<BotDifficulty>().is_err());
    }
}
