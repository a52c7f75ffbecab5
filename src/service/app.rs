//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the race
//! coordinator, the health server and the background maintenance tasks
//! together.

use crate::config::AppConfig;
use crate::content::{ContentSource, StaticContentSource};
use crate::coordinator::Coordinator;
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector};
use crate::store::{InMemoryResultStore, ResultStore};
use crate::types::GameMode;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to bind {address}: {message}")]
    Bind { address: String, message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Connection acceptance, matchmaking and live races
    coordinator: Arc<Coordinator>,

    /// Prometheus metrics shared by every component
    metrics: Arc<MetricsCollector>,

    /// HTTP health and metrics endpoints, present while running
    health_server: Mutex<Option<Arc<HealthServer>>>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with the built-in content source and an
    /// in-memory result store
    pub async fn new(config: AppConfig) -> Result<Arc<Self>, ServiceError> {
        info!("Initializing race-room coordinator");

        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        Ok(Self::with_components(
            config,
            Arc::new(StaticContentSource::new()),
            Arc::new(InMemoryResultStore::new()),
            metrics,
        ))
    }

    /// Assemble the service around explicit collaborators
    pub fn with_components(
        config: AppConfig,
        content: Arc<dyn ContentSource>,
        store: Arc<dyn ResultStore>,
        metrics: Arc<MetricsCollector>,
    ) -> Arc<Self> {
        let coordinator = Arc::new(Coordinator::new(
            config.clone(),
            content,
            store,
            metrics.clone(),
        ));

        Arc::new(Self {
            config,
            coordinator,
            metrics,
            health_server: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Start the game listener, health endpoints and background tasks
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting race-room coordinator");

        let listener =
            self.coordinator
                .bind()
                .await
                .map_err(|e| ServiceError::Bind {
                    address: self.config.bind_address(),
                    message: e.to_string(),
                })?;

        *self.is_running.write().await = true;

        self.start_health_server().await;

        let coordinator = self.coordinator.clone();
        let accept_task = tokio::spawn(async move {
            if let Err(e) = coordinator.serve(listener).await {
                error!("Accept loop failed: {}", e);
            }
        });
        self.background_tasks.lock().await.push(accept_task);

        self.start_background_tasks().await;

        info!("✅ race-room coordinator started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of race-room");

        *self.is_running.write().await = false;

        // Races first, so players get their GAME_END before the sockets close
        self.coordinator
            .shutdown(self.config.shutdown_timeout())
            .await;

        if let Some(server) = self.health_server.lock().await.take() {
            if let Err(e) = server.stop().await {
                warn!("Failed to stop health server: {}", e);
            } else {
                info!("✅ Health server stopped");
            }
        }

        self.stop_background_tasks().await;

        let final_stats = self.coordinator.stats();
        info!("Final service statistics: {:?}", final_stats);
        info!("✅ race-room shutdown completed");

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn coordinator(&self) -> Arc<Coordinator> {
        self.coordinator.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    async fn start_health_server(self: &Arc<Self>) {
        let health_config = HealthServerConfig {
            port: self.config.service.health_port,
            host: self.config.service.bind_host.clone(),
        };
        let server = Arc::new(
            HealthServer::new(health_config, self.metrics.clone()).with_app_state(self.clone()),
        );
        *self.health_server.lock().await = Some(server.clone());

        let port = self.config.service.health_port;
        let handle = tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("Health server failed: {}", e);
            } else {
                info!("Health server task completed");
            }
        });
        self.background_tasks.lock().await.push(handle);

        info!("✅ Health endpoints started on port {}", port);
    }

    /// Start background maintenance tasks
    async fn start_background_tasks(&self) {
        info!("Starting health metrics task (15s interval)...");

        let coordinator = self.coordinator.clone();
        let metrics = self.metrics.clone();
        let is_running = self.is_running.clone();
        let started_at = self.started_at;

        let health_metrics_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(15));
            info!("Health metrics task started");

            while *is_running.read().await {
                interval.tick().await;

                metrics.update_uptime(started_at.elapsed());
                for mode in GameMode::POOLED {
                    metrics.set_players_waiting(mode, coordinator.waiting(mode));
                }

                let accepting = coordinator.is_accepting();
                metrics.update_health_status(if accepting { 2 } else { 1 });
                metrics.update_component_health("coordinator", accepting);
                metrics.update_component_health("matchmaking", true);

                let stats = coordinator.stats();
                debug!(
                    "Updated service health metrics - connections: {}, races: {}, waiting: {}",
                    stats.active_connections, stats.active_races, stats.players_waiting
                );
            }

            info!("Health metrics task stopped");
        });

        self.background_tasks.lock().await.push(health_metrics_task);
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&self) {
        let tasks: Vec<JoinHandle<()>> = self.background_tasks.lock().await.drain(..).collect();
        if tasks.is_empty() {
            info!("No background tasks to stop");
            return;
        }

        let task_count = tasks.len();
        info!("Stopping {} background tasks...", task_count);
        for (i, task) in tasks.into_iter().enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let mut config = AppConfig::default();
        config.race.word_count = 0;

        let result = AppState::new(config).await;
        assert!(matches!(result, Err(ServiceError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_not_running_until_started() {
        let state = AppState::new(AppConfig::default()).await.unwrap();
        assert!(!state.is_running().await);
        assert_eq!(state.coordinator().stats().active_races, 0);
    }

    #[tokio::test]
    async fn test_shutdown_without_start_is_clean() {
        let state = AppState::new(AppConfig::default()).await.unwrap();
        state.shutdown().await.unwrap();
        assert!(!state.is_running().await);
        assert!(!state.coordinator().is_accepting());
    }
}
