use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use gm_alerts::AlertSystem;
use gm_analytics::{AnalyticsEngine, DashboardData, Recommendation};
use gm_bus::{EventBus, EventKind, MonitorEvent};
use gm_core::config::HubConfig;
use gm_core::shutdown::ShutdownSignal;
use gm_core::types::{
    Alert, AlertSeverity, CorrelatedEvent, CrossSystemEvent, HealthLevel, MonitoringSnapshot,
    PredictiveInsight,
};
use gm_monitor::RealtimeMonitor;
use gm_tracker::LifecycleTracker;

use crate::correlation::CorrelationTracker;
use crate::export::{render_prometheus, ExportError};

// ---------------------------------------------------------------------------
// Aggregation types
// ---------------------------------------------------------------------------

/// Receives the aggregated view on every sync cycle.
pub trait DashboardSink: Send + Sync {
    fn update(&self, data: &AggregatedData);
}

/// The combined view assembled from every component on each sync.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedData {
    pub generated_at: DateTime<Utc>,
    pub snapshot: MonitoringSnapshot,
    pub dashboard: DashboardData,
    pub recommendations: Vec<Recommendation>,
    pub active_alerts: Vec<Alert>,
    pub insights: Vec<PredictiveInsight>,
    pub correlated_events: Vec<CorrelatedEvent>,
}

/// Liveness verdict for one component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub component: String,
    pub health: HealthLevel,
    pub detail: String,
}

/// Lightweight status summary for health endpoints and CLIs.
///
/// `health` is the worst verdict across `components`.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub health: HealthLevel,
    pub components: Vec<ComponentHealth>,
    pub uptime_secs: u64,
    pub tasks_total: usize,
    pub agents_total: usize,
    pub active_alerts: usize,
    pub metric_series: usize,
    pub events_routed: u64,
    pub last_sync: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// IntegrationHub
// ---------------------------------------------------------------------------

/// The single router between components.
///
/// Subscribes to the bus, feeds every domain event into analytics and alert
/// evaluation, republishes a normalized cross-system envelope, and groups
/// envelopes by correlation id. Hub-origin events are never routed back
/// through, so the pipeline cannot feed itself.
pub struct IntegrationHub {
    config: HubConfig,
    tracker: Arc<LifecycleTracker>,
    analytics: Arc<AnalyticsEngine>,
    alerts: Arc<AlertSystem>,
    monitor: Arc<RealtimeMonitor>,
    bus: EventBus,
    shutdown: ShutdownSignal,
    correlation: Mutex<CorrelationTracker>,
    correlated: RwLock<VecDeque<CorrelatedEvent>>,
    sinks: RwLock<Vec<Arc<dyn DashboardSink>>>,
    events_routed: AtomicU64,
    last_sync: RwLock<Option<DateTime<Utc>>>,
}

impl IntegrationHub {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: HubConfig,
        tracker: Arc<LifecycleTracker>,
        analytics: Arc<AnalyticsEngine>,
        alerts: Arc<AlertSystem>,
        monitor: Arc<RealtimeMonitor>,
        bus: EventBus,
        shutdown: ShutdownSignal,
    ) -> Self {
        let window = Duration::from_millis(config.correlation_window_ms.max(1));
        Self {
            config,
            tracker,
            analytics,
            alerts,
            monitor,
            bus,
            shutdown,
            correlation: Mutex::new(CorrelationTracker::new(window)),
            correlated: RwLock::new(VecDeque::new()),
            sinks: RwLock::new(Vec::new()),
            events_routed: AtomicU64::new(0),
            last_sync: RwLock::new(None),
        }
    }

    /// Register a sink that receives the aggregated view on every sync.
    pub fn add_dashboard_sink(&self, sink: Arc<dyn DashboardSink>) {
        self.sinks.write().expect("sinks lock poisoned").push(sink);
    }

    // -- Event routing ------------------------------------------------------------

    /// Route one bus event through analytics, alerting, and correlation.
    pub fn route_event(&self, event: &MonitorEvent) {
        let kind = event.kind();
        if matches!(
            kind,
            EventKind::CrossSystem | EventKind::EventsCorrelated | EventKind::SyncCompleted
        ) {
            return;
        }
        self.events_routed.fetch_add(1, Ordering::Relaxed);

        self.analytics.ingest_event(event);
        // Raised alerts come back through the bus as AlertCreated; do not
        // feed those into rule evaluation again.
        if kind != EventKind::AlertCreated {
            self.alerts.process_event(event);
        }

        let envelope = CrossSystemEvent {
            source: event.source().to_string(),
            event_type: kind.as_str().to_string(),
            timestamp: Utc::now(),
            correlation_id: event.correlation_id().map(str::to_string),
            data: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
        };
        self.bus.publish(MonitorEvent::CrossSystem {
            envelope: envelope.clone(),
        });

        let correlated = self
            .correlation
            .lock()
            .expect("correlation lock poisoned")
            .observe(envelope, Instant::now());
        if let Some(correlated) = correlated {
            self.retain_correlated(correlated.clone());
            self.bus
                .publish(MonitorEvent::EventsCorrelated { correlated });
        }
    }

    fn retain_correlated(&self, correlated: CorrelatedEvent) {
        let mut retained = self.correlated.write().expect("correlated lock poisoned");
        retained.push_back(correlated);
        while retained.len() > self.config.correlated_event_cap.max(1) {
            retained.pop_front();
        }
    }

    /// Correlated event groups, newest first.
    pub fn get_correlated_events(&self) -> Vec<CorrelatedEvent> {
        self.correlated
            .read()
            .expect("correlated lock poisoned")
            .iter()
            .rev()
            .cloned()
            .collect()
    }

    /// Total domain events routed since construction.
    pub fn events_routed(&self) -> u64 {
        self.events_routed.load(Ordering::Relaxed)
    }

    // -- Sync ----------------------------------------------------------------------

    /// Assemble the aggregated view, push it to every sink, and publish a
    /// sync-completed event.
    pub fn trigger_sync(&self) -> AggregatedData {
        let data = self.get_aggregated_data();
        for sink in self.sinks.read().expect("sinks lock poisoned").iter() {
            sink.update(&data);
        }

        let now = Utc::now();
        *self.last_sync.write().expect("last_sync lock poisoned") = Some(now);
        debug!("cross-component sync completed");
        self.bus.publish(MonitorEvent::SyncCompleted { timestamp: now });
        data
    }

    /// The combined view over every component, assembled on demand.
    pub fn get_aggregated_data(&self) -> AggregatedData {
        AggregatedData {
            generated_at: Utc::now(),
            snapshot: self.monitor.get_current_snapshot(),
            dashboard: self.analytics.get_dashboard_data(),
            recommendations: self.analytics.generate_optimization_recommendations(),
            active_alerts: self.alerts.get_active_alerts(None),
            insights: self.monitor.get_predictive_insights(),
            correlated_events: self.get_correlated_events(),
        }
    }

    /// Query each component's liveness. Worst verdict wins overall.
    pub fn component_health(&self) -> Vec<ComponentHealth> {
        let snapshot = self.monitor.get_current_snapshot();
        let active_alerts = self.alerts.get_active_alerts(None);

        let agents = &snapshot.agent_metrics;
        let tracker_health = if agents.total > 0 && agents.offline == agents.total {
            HealthLevel::Unhealthy
        } else {
            HealthLevel::Healthy
        };

        let worst_alert = active_alerts.iter().map(|a| a.severity).max();
        let alerts_health = match worst_alert {
            Some(s) if s >= AlertSeverity::Critical => HealthLevel::Unhealthy,
            Some(s) if s >= AlertSeverity::High => HealthLevel::Degraded,
            _ => HealthLevel::Healthy,
        };

        vec![
            ComponentHealth {
                component: "tracker".to_string(),
                health: tracker_health,
                detail: format!(
                    "{} tasks, {} agents ({} offline)",
                    snapshot.task_metrics.total, agents.total, agents.offline
                ),
            },
            ComponentHealth {
                component: "analytics".to_string(),
                health: HealthLevel::Healthy,
                detail: format!("{} metric series", self.analytics.series_count()),
            },
            ComponentHealth {
                component: "alerts".to_string(),
                health: alerts_health,
                detail: format!("{} unresolved alerts", active_alerts.len()),
            },
            ComponentHealth {
                component: "monitor".to_string(),
                health: snapshot.system_health.overall,
                detail: format!(
                    "{:.1} MB, {:.1}% cpu",
                    snapshot.system_health.memory_usage_mb,
                    snapshot.system_health.cpu_usage_percent
                ),
            },
        ]
    }

    /// Condensed status for health endpoints.
    pub fn get_system_status(&self) -> SystemStatus {
        let components = self.component_health();
        let health = components
            .iter()
            .map(|c| c.health)
            .max()
            .unwrap_or_default();
        let snapshot = self.monitor.get_current_snapshot();
        SystemStatus {
            health,
            components,
            uptime_secs: self.tracker.uptime_secs(),
            tasks_total: snapshot.task_metrics.total,
            agents_total: snapshot.agent_metrics.total,
            active_alerts: self.alerts.get_active_alerts(None).len(),
            metric_series: self.analytics.series_count(),
            events_routed: self.events_routed(),
            last_sync: *self.last_sync.read().expect("last_sync lock poisoned"),
        }
    }

    // -- Export --------------------------------------------------------------------

    /// Render the aggregated state in one of the configured formats.
    ///
    /// JSON mirrors the sampler's export enriched with per-component
    /// sections; CSV covers the trailing `hours` of snapshot history.
    pub fn export_data(&self, format: &str, hours: i64) -> Result<String, ExportError> {
        if !self.config.enable_metrics_export {
            return Err(ExportError::Disabled);
        }
        if !self.config.export_formats.iter().any(|f| f == format) {
            return Err(ExportError::UnsupportedFormat(format.to_string()));
        }

        match format {
            "json" => {
                let data = self.get_aggregated_data();
                let doc = serde_json::json!({
                    "timestamp": data.generated_at,
                    "snapshot": data.snapshot,
                    "task_metrics": data.snapshot.task_metrics,
                    "agent_metrics": data.snapshot.agent_metrics,
                    "dashboard": data.dashboard,
                    "recommendations": data.recommendations,
                    "alerts": data.active_alerts,
                    "insights": data.insights,
                    "correlated_events": data.correlated_events,
                    "history": self.monitor.get_monitoring_history(hours),
                });
                Ok(serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".to_string()))
            }
            "csv" => Ok(gm_monitor::export::render_csv(
                &self.monitor.get_monitoring_history(hours),
            )),
            "prometheus" => Ok(render_prometheus(
                &self.monitor.get_current_snapshot(),
                self.events_routed(),
            )),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }

    // -- Timer loops -----------------------------------------------------------------

    /// Spawn the event-forwarding and sync loops. Both run until the
    /// shutdown signal fires.
    pub fn start(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::with_capacity(2);

        let hub = Arc::clone(self);
        let rx = self.bus.subscribe();
        let mut shutdown_rx = self.shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            info!("integration hub event loop started");
            loop {
                tokio::select! {
                    event = rx.recv_async() => match event {
                        Ok(event) => hub.route_event(&event),
                        Err(_) => {
                            warn!("event bus closed; hub event loop exiting");
                            break;
                        }
                    },
                    _ = shutdown_rx.recv() => {
                        info!("integration hub event loop stopped");
                        break;
                    }
                }
            }
        }));

        let hub = Arc::clone(self);
        let mut shutdown_rx = self.shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            let period = Duration::from_millis(hub.config.sync_interval_ms.max(1));
            let mut ticker = tokio::time::interval(period);
            info!(?period, "integration hub sync loop started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        hub.trigger_sync();
                        for component in hub.component_health() {
                            if component.health > HealthLevel::Healthy {
                                warn!(
                                    component = %component.component,
                                    health = ?component.health,
                                    detail = %component.detail,
                                    "component health check failed"
                                );
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("integration hub sync loop stopped");
                        break;
                    }
                }
            }
        }));

        handles
    }

    /// Stop both loops after their current iteration.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}
