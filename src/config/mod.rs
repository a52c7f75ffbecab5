//! Configuration management for the race-room service
//!
//! This module handles configuration loading from TOML files and environment
//! variables, validation, and default values for the coordinator.

pub mod app;
pub mod bot;
pub mod race;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings};
pub use bot::BotSettings;
pub use race::RaceSettings;
