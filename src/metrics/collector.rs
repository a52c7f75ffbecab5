//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the race-room coordinator
//! using Prometheus metrics.

use crate::bot::BotDifficulty;
use crate::types::GameMode;
use anyhow::Result;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the coordinator
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Connection-related metrics
    connection_metrics: ConnectionMetrics,

    /// Matchmaking pool metrics
    matchmaking_metrics: MatchmakingMetrics,

    /// Race session metrics
    race_metrics: RaceMetrics,

    /// Bot-related metrics
    bot_metrics: BotMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Connection-related metrics
#[derive(Clone)]
pub struct ConnectionMetrics {
    /// Currently open player connections
    pub active_connections: IntGauge,

    /// Total connections accepted
    pub connections_total: IntCounter,

    /// Connections refused because the server was full
    pub connections_rejected_total: IntCounter,

    /// Frames answered with ERROR, by kind
    pub protocol_errors_total: IntCounterVec,
}

/// Matchmaking pool metrics
#[derive(Clone)]
pub struct MatchmakingMetrics {
    /// Players currently waiting, by mode
    pub players_waiting: IntGaugeVec,

    /// Players routed through matchmaking, by mode
    pub players_enqueued_total: IntCounterVec,

    /// Pairs handed to session creation, by mode
    pub matches_created_total: IntCounterVec,

    /// Time spent routing one player
    pub enqueue_duration_seconds: HistogramVec,
}

/// Race session metrics
#[derive(Clone)]
pub struct RaceMetrics {
    /// Races currently running, by mode
    pub active_races: IntGaugeVec,

    /// Total races started, by mode
    pub races_started_total: IntCounterVec,

    /// Total races ended, by mode and end reason
    pub races_ended_total: IntCounterVec,

    /// Race duration from start to end
    pub race_duration_seconds: HistogramVec,

    /// Attacks launched, by mode
    pub attacks_total: IntCounterVec,

    /// Players eliminated, by mode
    pub eliminations_total: IntCounterVec,

    /// Results the store refused
    pub result_report_failures_total: IntCounter,
}

/// Bot-related metrics
#[derive(Clone)]
pub struct BotMetrics {
    /// Bots currently racing
    pub active_bots: IntGauge,

    /// Bots created, by difficulty
    pub bots_spawned_total: IntCounterVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let connection_metrics = ConnectionMetrics::new(&registry)?;
        let matchmaking_metrics = MatchmakingMetrics::new(&registry)?;
        let race_metrics = RaceMetrics::new(&registry)?;
        let bot_metrics = BotMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            connection_metrics,
            matchmaking_metrics,
            race_metrics,
            bot_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get connection metrics
    pub fn connection(&self) -> &ConnectionMetrics {
        &self.connection_metrics
    }

    /// Get matchmaking metrics
    pub fn matchmaking(&self) -> &MatchmakingMetrics {
        &self.matchmaking_metrics
    }

    /// Get race metrics
    pub fn race(&self) -> &RaceMetrics {
        &self.race_metrics
    }

    /// Get bot metrics
    pub fn bot(&self) -> &BotMetrics {
        &self.bot_metrics
    }

    /// Record a connection being accepted
    pub fn record_connection_opened(&self) {
        self.connection_metrics.connections_total.inc();
        self.connection_metrics.active_connections.inc();
    }

    /// Record a connection being released
    pub fn record_connection_closed(&self) {
        self.connection_metrics.active_connections.dec();
    }

    /// Record a connection refused at the limit
    pub fn record_connection_rejected(&self) {
        self.connection_metrics.connections_rejected_total.inc();
    }

    /// Record a frame answered with ERROR
    pub fn record_protocol_error(&self, kind: &str) {
        self.connection_metrics
            .protocol_errors_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record a player routed through matchmaking
    pub fn record_enqueue(&self, mode: GameMode, duration: Duration) {
        self.matchmaking_metrics
            .players_enqueued_total
            .with_label_values(&[mode.as_str()])
            .inc();

        self.matchmaking_metrics
            .enqueue_duration_seconds
            .with_label_values(&[mode.as_str()])
            .observe(duration.as_secs_f64());
    }

    /// Update the waiting gauge of one pool
    pub fn set_players_waiting(&self, mode: GameMode, waiting: usize) {
        self.matchmaking_metrics
            .players_waiting
            .with_label_values(&[mode.as_str()])
            .set(waiting as i64);
    }

    /// Record a pair handed to session creation
    pub fn record_match_created(&self, mode: GameMode) {
        self.matchmaking_metrics
            .matches_created_total
            .with_label_values(&[mode.as_str()])
            .inc();
    }

    /// Record a race session starting
    pub fn record_race_started(&self, mode: GameMode) {
        self.race_metrics
            .races_started_total
            .with_label_values(&[mode.as_str()])
            .inc();

        self.race_metrics
            .active_races
            .with_label_values(&[mode.as_str()])
            .inc();
    }

    /// Record a race session ending
    pub fn record_race_ended(&self, mode: GameMode, reason: &str, duration: Duration) {
        self.race_metrics
            .races_ended_total
            .with_label_values(&[mode.as_str(), reason])
            .inc();

        self.race_metrics
            .active_races
            .with_label_values(&[mode.as_str()])
            .dec();

        self.race_metrics
            .race_duration_seconds
            .with_label_values(&[mode.as_str()])
            .observe(duration.as_secs_f64());
    }

    /// Record an attack being launched
    pub fn record_attack(&self, mode: GameMode) {
        self.race_metrics
            .attacks_total
            .with_label_values(&[mode.as_str()])
            .inc();
    }

    /// Record a player being eliminated
    pub fn record_elimination(&self, mode: GameMode) {
        self.race_metrics
            .eliminations_total
            .with_label_values(&[mode.as_str()])
            .inc();
    }

    /// Record a result the store failed to accept
    pub fn record_result_report_failure(&self) {
        self.race_metrics.result_report_failures_total.inc();
    }

    /// Record a bot being created
    pub fn record_bot_spawned(&self, difficulty: BotDifficulty) {
        self.bot_metrics
            .bots_spawned_total
            .with_label_values(&[difficulty.as_str()])
            .inc();
    }

    /// Update service uptime
    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new("race_room_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "race_room_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("race_room_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl ConnectionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_connections = IntGauge::new(
            "race_room_active_connections",
            "Currently open player connections",
        )?;
        registry.register(Box::new(active_connections.clone()))?;

        let connections_total = IntCounter::new(
            "race_room_connections_total",
            "Total player connections accepted",
        )?;
        registry.register(Box::new(connections_total.clone()))?;

        let connections_rejected_total = IntCounter::new(
            "race_room_connections_rejected_total",
            "Connections refused at the connection limit",
        )?;
        registry.register(Box::new(connections_rejected_total.clone()))?;

        let protocol_errors_total = IntCounterVec::new(
            Opts::new(
                "race_room_protocol_errors_total",
                "Frames answered with an ERROR message",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(protocol_errors_total.clone()))?;

        Ok(Self {
            active_connections,
            connections_total,
            connections_rejected_total,
            protocol_errors_total,
        })
    }
}

impl MatchmakingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let players_waiting = IntGaugeVec::new(
            Opts::new(
                "race_room_players_waiting",
                "Players currently waiting for an opponent",
            ),
            &["mode"],
        )?;
        registry.register(Box::new(players_waiting.clone()))?;

        let players_enqueued_total = IntCounterVec::new(
            Opts::new(
                "race_room_players_enqueued_total",
                "Players routed through matchmaking",
            ),
            &["mode"],
        )?;
        registry.register(Box::new(players_enqueued_total.clone()))?;

        let matches_created_total = IntCounterVec::new(
            Opts::new("race_room_matches_created_total", "Total matches created"),
            &["mode"],
        )?;
        registry.register(Box::new(matches_created_total.clone()))?;

        let enqueue_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "race_room_enqueue_duration_seconds",
                "Time spent routing one player",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]),
            &["mode"],
        )?;
        registry.register(Box::new(enqueue_duration_seconds.clone()))?;

        Ok(Self {
            players_waiting,
            players_enqueued_total,
            matches_created_total,
            enqueue_duration_seconds,
        })
    }
}

impl RaceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_races = IntGaugeVec::new(
            Opts::new("race_room_active_races", "Races currently running"),
            &["mode"],
        )?;
        registry.register(Box::new(active_races.clone()))?;

        let races_started_total = IntCounterVec::new(
            Opts::new("race_room_races_started_total", "Total races started"),
            &["mode"],
        )?;
        registry.register(Box::new(races_started_total.clone()))?;

        let races_ended_total = IntCounterVec::new(
            Opts::new("race_room_races_ended_total", "Total races ended"),
            &["mode", "reason"],
        )?;
        registry.register(Box::new(races_ended_total.clone()))?;

        let race_duration_seconds = HistogramVec::new(
            HistogramOpts::new("race_room_race_duration_seconds", "Race duration")
                .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 180.0, 240.0, 300.0]),
            &["mode"],
        )?;
        registry.register(Box::new(race_duration_seconds.clone()))?;

        let attacks_total = IntCounterVec::new(
            Opts::new("race_room_attacks_total", "Attacks launched"),
            &["mode"],
        )?;
        registry.register(Box::new(attacks_total.clone()))?;

        let eliminations_total = IntCounterVec::new(
            Opts::new("race_room_eliminations_total", "Players eliminated"),
            &["mode"],
        )?;
        registry.register(Box::new(eliminations_total.clone()))?;

        let result_report_failures_total = IntCounter::new(
            "race_room_result_report_failures_total",
            "Match results the store failed to accept",
        )?;
        registry.register(Box::new(result_report_failures_total.clone()))?;

        Ok(Self {
            active_races,
            races_started_total,
            races_ended_total,
            race_duration_seconds,
            attacks_total,
            eliminations_total,
            result_report_failures_total,
        })
    }
}

impl BotMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_bots = IntGauge::new("race_room_active_bots", "Bots currently racing")?;
        registry.register(Box::new(active_bots.clone()))?;

        let bots_spawned_total = IntCounterVec::new(
            Opts::new("race_room_bots_spawned_total", "Bots created"),
            &["difficulty"],
        )?;
        registry.register(Box::new(bots_spawned_total.clone()))?;

        Ok(Self {
            active_bots,
            bots_spawned_total,
        })
    }
}
