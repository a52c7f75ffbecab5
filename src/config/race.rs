//! Race rule configuration

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for a single race session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceSettings {
    /// Number of words in the shared list
    pub word_count: usize,
    /// Period of the opponent-progress broadcast
    pub broadcast_interval_ms: u64,
    /// Upper bound on how long readiness goes unchecked
    pub ready_poll_ms: u64,
    /// Races still running after this are resolved by standings
    pub max_duration_seconds: u64,
    /// WPM at which a player's attack fires
    pub attack_wpm_threshold: f64,
    /// Number of hard words carried by one attack
    pub attack_word_count: usize,
    /// Starting health in elimination mode
    pub initial_health: u32,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            word_count: 50,
            broadcast_interval_ms: 500,
            ready_poll_ms: 100,
            max_duration_seconds: 300, // 5 minutes
            attack_wpm_threshold: 60.0,
            attack_word_count: 3,
            initial_health: 3,
        }
    }
}

impl RaceSettings {
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    pub fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        if self.word_count == 0 {
            return Err(anyhow!("Word count must be greater than 0"));
        }
        if self.broadcast_interval_ms == 0 {
            return Err(anyhow!("Broadcast interval must be greater than 0"));
        }
        if self.ready_poll_ms == 0 {
            return Err(anyhow!("Ready poll interval must be greater than 0"));
        }
        if self.max_duration_seconds == 0 {
            return Err(anyhow!("Max race duration must be greater than 0"));
        }
        if !self.attack_wpm_threshold.is_finite() || self.attack_wpm_threshold <= 0.0 {
            return Err(anyhow!("Attack WPM threshold must be positive"));
        }
        if self.initial_health == 0 {
            return Err(anyhow!("Initial health must be greater than 0"));
        }
        Ok(())
    }
}
