//! Metrics and monitoring for the race-room coordinator
//!
//! This module provides Prometheus metrics collection and the HTTP health
//! server that exposes them.

pub mod collector;
pub mod health;

pub use collector::{
    BotMetrics, ConnectionMetrics, MatchmakingMetrics, MetricsCollector, MetricsTimer,
    RaceMetrics, ServiceMetrics,
};
pub use health::{HealthServer, HealthServerConfig};
