//! Health check reporting
//!
//! This module provides the health and statistics report for the race-room
//! coordinator, including readiness and liveness probes.

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Crate version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    pub active_connections: usize,
    pub connections_accepted: u64,
    pub connections_rejected: u64,
    pub active_races: usize,
    pub active_races_by_mode: HashMap<String, usize>,
    pub races_started: u64,
    pub races_finished: u64,
    pub players_waiting: usize,
    pub uptime_seconds: u64,
}

/// Share of the connection limit above which the service reports degraded
const CAPACITY_WARNING_RATIO: f64 = 0.9;

impl HealthCheck {
    /// Perform a full health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let checks = vec![
            Self::check_service_running(&app_state).await,
            Self::check_coordinator(&app_state),
            Self::check_connection_capacity(&app_state),
        ];

        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |overall, check| {
                match (&overall, &check.status) {
                    (_, HealthStatus::Unhealthy) | (HealthStatus::Unhealthy, _) => {
                        HealthStatus::Unhealthy
                    }
                    (_, HealthStatus::Degraded) | (HealthStatus::Degraded, _) => {
                        HealthStatus::Degraded
                    }
                    _ => HealthStatus::Healthy,
                }
            });

        Ok(HealthCheck {
            status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: Self::gather_service_stats(&app_state),
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can take new players
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        let coordinator = Self::check_coordinator(&app_state);
        if coordinator.status != HealthStatus::Healthy {
            return Ok(coordinator.status);
        }
        Ok(Self::check_connection_capacity(&app_state).status)
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_coordinator(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.coordinator().is_accepting() {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Coordinator is not accepting connections".to_string()),
            )
        };

        ComponentCheck {
            name: "coordinator".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_connection_capacity(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let max = app_state.config().service.max_connections;
        let active = app_state.coordinator().stats().active_connections;
        let (status, message) = if active >= max {
            (
                HealthStatus::Degraded,
                Some(format!("Connection limit reached ({}/{})", active, max)),
            )
        } else if active as f64 >= max as f64 * CAPACITY_WARNING_RATIO {
            (
                HealthStatus::Degraded,
                Some(format!("Near connection limit ({}/{})", active, max)),
            )
        } else {
            (HealthStatus::Healthy, None)
        };

        ComponentCheck {
            name: "connection_capacity".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        let stats = app_state.coordinator().stats();

        ServiceStats {
            active_connections: stats.active_connections,
            connections_accepted: stats.connections_accepted,
            connections_rejected: stats.connections_rejected,
            active_races: stats.active_races,
            active_races_by_mode: stats.active_races_by_mode,
            races_started: stats.races_started,
            races_finished: stats.races_finished,
            players_waiting: stats.players_waiting,
            uptime_seconds: app_state.uptime().as_secs(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn test_stopped_service_is_unhealthy() {
        let state = AppState::new(AppConfig::default()).await.unwrap();

        let health = HealthCheck::check(state.clone()).await.unwrap();
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.service, "race-room");
        assert_eq!(health.stats.active_races, 0);

        assert_eq!(
            HealthCheck::liveness_check(state.clone()).await.unwrap(),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthCheck::readiness_check(state).await.unwrap(),
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_report_serializes() {
        let state = AppState::new(AppConfig::default()).await.unwrap();
        let json = HealthCheck::check(state).await.unwrap().to_json().unwrap();
        assert!(json.contains("\"connection_capacity\""));
        assert!(json.contains("\"players_waiting\""));
    }
}
