//! Main application configuration
//!
//! This module defines the primary configuration structures for the race-room
//! coordinator, including TOML file loading, environment variable overrides
//! and validation.

use crate::config::bot::BotSettings;
use crate::config::race::RaceSettings;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub race: RaceSettings,
    pub bot: BotSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Interface the game listener binds to
    pub bind_host: String,
    /// Port for player connections
    pub port: u16,
    /// Port for health check endpoint
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Maximum concurrent player connections
    pub max_connections: usize,
    /// Time a new connection has to send CONNECT
    pub handshake_timeout_seconds: u64,
    /// Outbound messages buffered per connection before it counts as stalled
    pub outbound_buffer: usize,
    /// Longest inbound line accepted, in bytes
    pub max_frame_bytes: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "race-room".to_string(),
            log_level: "info".to_string(),
            bind_host: "0.0.0.0".to_string(),
            port: 9090,
            health_port: 8080,
            shutdown_timeout_seconds: 30,
            max_connections: 1000,
            handshake_timeout_seconds: 30,
            outbound_buffer: 64,
            max_frame_bytes: 16 * 1024,
        }
    }
}

impl ServiceSettings {
    /// Time a new connection has to send CONNECT
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_seconds)
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(host) = env::var("BIND_HOST") {
            self.service.bind_host = host;
        }
        if let Ok(port) = env::var("GAME_PORT") {
            self.service.port = port
                .parse()
                .map_err(|_| anyhow!("Invalid GAME_PORT value: {}", port))?;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            self.service.health_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HEALTH_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }
        if let Ok(max) = env::var("MAX_CONNECTIONS") {
            self.service.max_connections = max
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_CONNECTIONS value: {}", max))?;
        }
        if let Ok(timeout) = env::var("HANDSHAKE_TIMEOUT_SECONDS") {
            self.service.handshake_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid HANDSHAKE_TIMEOUT_SECONDS value: {}", timeout))?;
        }
        if let Ok(max) = env::var("MAX_FRAME_BYTES") {
            self.service.max_frame_bytes = max
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_FRAME_BYTES value: {}", max))?;
        }

        // Race settings
        if let Ok(count) = env::var("RACE_WORD_COUNT") {
            self.race.word_count = count
                .parse()
                .map_err(|_| anyhow!("Invalid RACE_WORD_COUNT value: {}", count))?;
        }
        if let Ok(interval) = env::var("RACE_BROADCAST_INTERVAL_MS") {
            self.race.broadcast_interval_ms = interval
                .parse()
                .map_err(|_| anyhow!("Invalid RACE_BROADCAST_INTERVAL_MS value: {}", interval))?;
        }
        if let Ok(duration) = env::var("RACE_MAX_DURATION_SECONDS") {
            self.race.max_duration_seconds = duration
                .parse()
                .map_err(|_| anyhow!("Invalid RACE_MAX_DURATION_SECONDS value: {}", duration))?;
        }
        if let Ok(threshold) = env::var("RACE_ATTACK_WPM_THRESHOLD") {
            self.race.attack_wpm_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("Invalid RACE_ATTACK_WPM_THRESHOLD value: {}", threshold))?;
        }
        if let Ok(health) = env::var("RACE_INITIAL_HEALTH") {
            self.race.initial_health = health
                .parse()
                .map_err(|_| anyhow!("Invalid RACE_INITIAL_HEALTH value: {}", health))?;
        }

        // Bot settings
        if let Ok(difficulty) = env::var("BOT_DEFAULT_DIFFICULTY") {
            self.bot.default_difficulty = difficulty
                .parse()
                .map_err(|_| anyhow!("Invalid BOT_DEFAULT_DIFFICULTY value: {}", difficulty))?;
        }
        if let Ok(jitter) = env::var("BOT_JITTER") {
            self.bot.jitter = jitter
                .parse()
                .map_err(|_| anyhow!("Invalid BOT_JITTER value: {}", jitter))?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get handshake timeout as Duration
    pub fn handshake_timeout(&self) -> Duration {
        self.service.handshake_timeout()
    }

    /// Address the game listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.bind_host, self.service.port)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.name.is_empty() {
        return Err(anyhow!("Service name cannot be empty"));
    }

    // Validate ports
    if config.service.port == 0 {
        return Err(anyhow!("Game port cannot be 0"));
    }
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.port == config.service.health_port {
        return Err(anyhow!(
            "Game port and health port must differ: {}",
            config.service.port
        ));
    }

    // Validate timeouts and limits
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.service.handshake_timeout_seconds == 0 {
        return Err(anyhow!("Handshake timeout must be greater than 0"));
    }
    if config.service.max_connections == 0 {
        return Err(anyhow!("Max connections must be greater than 0"));
    }
    if config.service.outbound_buffer == 0 {
        return Err(anyhow!("Outbound buffer must be greater than 0"));
    }
    if config.service.max_frame_bytes < 256 {
        return Err(anyhow!(
            "Max frame size must be at least 256 bytes: {}",
            config.service.max_frame_bytes
        ));
    }

    config.race.validate()?;
    config.bot.validate()?;

    Ok(())
}
