//! Bot opponent configuration

use crate::bot::BotDifficulty;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    /// Difficulty used when CONNECT does not name one
    pub default_difficulty: BotDifficulty,
    /// Relative spread applied to every per-word delay (0.10 = +/-10%)
    pub jitter: f64,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            default_difficulty: BotDifficulty::Medium,
            jitter: 0.10,
        }
    }
}

impl BotSettings {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(anyhow!("Bot jitter must be within [0, 1): {}", self.jitter));
        }
        Ok(())
    }
}
