use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use gm_alerts::{AlertContext, AlertRule, AlertSystem, RuleSet};
use gm_analytics::{AnalyticsEngine, TimeRange};
use gm_bus::{EventBus, EventKind, MonitorEvent};
use gm_core::config::SamplerConfig;
use gm_core::shutdown::ShutdownSignal;
use gm_core::types::{
    AlertSeverity, HealthLevel, MonitoringSnapshot, PerformanceMetrics, PredictiveInsight,
    QualityTrend, SnapshotTrends, SystemHealth, TrendDirection,
};
use gm_tracker::{LifecycleTracker, PerformanceSummary};

use crate::export::{render_csv, render_json, ExportError};
use crate::insights::derive_insights;
use crate::probe::{ResourceProbe, ResourceSample};

/// Maximum insights retained for queries, newest-first.
const INSIGHT_CAP: usize = 50;

/// Relative change below which a snapshot-to-snapshot trend is stable.
const TREND_EPSILON: f64 = 0.01;

// ---------------------------------------------------------------------------
// RealtimeMonitor
// ---------------------------------------------------------------------------

/// Periodic sampler producing immutable [`MonitoringSnapshot`]s.
///
/// Each tick aggregates tracker roll-ups with process resource usage,
/// classifies overall health, evaluates snapshot-driven alert rules, and
/// appends to a bounded history ring. The insight pass runs on a slower
/// cadence over that history.
pub struct RealtimeMonitor {
    tracker: Arc<LifecycleTracker>,
    analytics: Arc<AnalyticsEngine>,
    alerts: Arc<AlertSystem>,
    probe: Box<dyn ResourceProbe>,
    config: SamplerConfig,
    bus: EventBus,
    shutdown: ShutdownSignal,
    // Snapshots ordered oldest to newest.
    history: RwLock<VecDeque<MonitoringSnapshot>>,
    insights: RwLock<Vec<PredictiveInsight>>,
    rules: Mutex<RuleSet>,
    tick_count: AtomicU64,
}

impl RealtimeMonitor {
    pub fn new(
        config: SamplerConfig,
        tracker: Arc<LifecycleTracker>,
        analytics: Arc<AnalyticsEngine>,
        alerts: Arc<AlertSystem>,
        probe: Box<dyn ResourceProbe>,
        bus: EventBus,
        shutdown: ShutdownSignal,
    ) -> Self {
        let monitor = Self {
            tracker,
            analytics,
            alerts,
            probe,
            config,
            bus,
            shutdown,
            history: RwLock::new(VecDeque::new()),
            insights: RwLock::new(Vec::new()),
            rules: Mutex::new(RuleSet::new()),
            tick_count: AtomicU64::new(0),
        };
        monitor.install_default_rules();
        monitor
    }

    fn install_default_rules(&self) {
        // Built-in rules carry no cooldown of their own; the alert system's
        // configured default applies.
        let cooldown = self.alerts.default_cooldown();
        let mut rules = self.rules.lock().expect("rules lock poisoned");

        rules.upsert(
            AlertRule::new(
                "high_failure_rate",
                "High task failure rate",
                AlertSeverity::High,
                vec![EventKind::SnapshotCollected],
                cooldown,
                Arc::new(|ctx: &AlertContext| {
                    Ok(ctx.snapshot.as_ref().is_some_and(|s| {
                        s.task_metrics.failed >= 3 && s.task_metrics.success_rate < 50.0
                    }))
                }),
            )
            .with_category("tasks")
            .with_description("Three or more failed tasks with a sub-50% success rate."),
        );

        let memory_critical_mb = self.config.memory_critical_mb;
        rules.upsert(
            AlertRule::new(
                "critical_memory_usage",
                "Critical memory usage",
                AlertSeverity::Critical,
                vec![EventKind::SnapshotCollected],
                cooldown,
                Arc::new(move |ctx: &AlertContext| {
                    Ok(ctx
                        .snapshot
                        .as_ref()
                        .is_some_and(|s| s.system_health.memory_usage_mb >= memory_critical_mb))
                }),
            )
            .with_category("resources")
            .with_description("Resident memory crossed the critical threshold."),
        );

        let error_rate_critical = self.config.error_rate_critical_percent;
        rules.upsert(
            AlertRule::new(
                "high_error_rate",
                "High error rate",
                AlertSeverity::Critical,
                vec![EventKind::SnapshotCollected],
                cooldown,
                Arc::new(move |ctx: &AlertContext| {
                    Ok(ctx
                        .snapshot
                        .as_ref()
                        .is_some_and(|s| s.performance_metrics.error_rate > error_rate_critical))
                }),
            )
            .with_category("tasks")
            .with_description("Task error rate crossed the critical threshold."),
        );

        if self.config.enable_anomaly_detection {
            let tracker = Arc::clone(&self.tracker);
            let stale_secs = self.config.stale_heartbeat_secs;
            rules.upsert(
                AlertRule::new(
                    "stale_agent_heartbeat",
                    "Stale agent heartbeat",
                    AlertSeverity::Medium,
                    vec![EventKind::SnapshotCollected],
                    cooldown,
                    Arc::new(move |_: &AlertContext| {
                        let cutoff = Utc::now() - ChronoDuration::seconds(stale_secs);
                        Ok(tracker.list_agents().iter().any(|a| {
                            a.status != gm_core::types::AgentStatus::Offline
                                && a.last_heartbeat < cutoff
                        }))
                    }),
                )
                .with_category("agents")
                .with_description("An agent has not sent a heartbeat inside the stale window."),
            );

            rules.upsert(
                AlertRule::new(
                    "stalled_throughput",
                    "Throughput stalled with work in progress",
                    AlertSeverity::Medium,
                    vec![EventKind::SnapshotCollected],
                    cooldown,
                    Arc::new(|ctx: &AlertContext| {
                        Ok(ctx.snapshot.as_ref().is_some_and(|s| {
                            s.task_metrics.in_progress > 0
                                && s.task_metrics.throughput_per_hour == 0.0
                                && s.task_metrics.completed + s.task_metrics.failed > 0
                        }))
                    }),
                )
                .with_category("tasks")
                .with_description("Tasks are in progress but nothing completed in the last hour."),
            );
        }
    }

    // -- Rule management -------------------------------------------------------

    /// Register or replace a sampler alert rule.
    pub fn add_alert_rule(&self, rule: AlertRule) {
        self.rules.lock().expect("rules lock poisoned").upsert(rule);
    }

    /// Remove a sampler alert rule. Returns `false` for unknown ids.
    pub fn remove_alert_rule(&self, id: &str) -> bool {
        self.rules.lock().expect("rules lock poisoned").remove(id)
    }

    // -- Sampling ----------------------------------------------------------------

    /// Perform one sampling tick and return the snapshot it produced.
    pub fn run_tick(&self) -> MonitoringSnapshot {
        let summary = self.tracker.get_performance_metrics();
        let resources = match self.probe.sample() {
            Ok(sample) => sample,
            Err(e) => {
                // A dead probe degrades the snapshot, never fails it.
                warn!(error = %e, "resource probe failed; reporting zeroed resource usage");
                ResourceSample::default()
            }
        };

        let performance = self.performance_block(&summary);
        let overall = self.classify_health(resources.memory_mb, performance.error_rate);
        let snapshot = MonitoringSnapshot {
            timestamp: Utc::now(),
            system_health: SystemHealth {
                overall,
                uptime_secs: self.tracker.uptime_secs(),
                memory_usage_mb: resources.memory_mb,
                cpu_usage_percent: resources.cpu_percent,
            },
            trends: self.compute_trends(&summary, &performance, overall),
            task_metrics: summary.tasks,
            agent_metrics: summary.agents,
            performance_metrics: performance,
            active_alerts: self.alerts.get_active_alerts(None),
        };

        self.alerts.observe_snapshot(snapshot.clone());
        self.evaluate_rules(&snapshot);

        {
            let mut history = self.history.write().expect("history lock poisoned");
            history.push_back(snapshot.clone());
            while history.len() > self.config.history_cap.max(1) {
                history.pop_front();
            }
        }

        debug!(health = ?overall, "monitoring snapshot collected");
        self.bus.publish(MonitorEvent::SnapshotCollected {
            snapshot: Box::new(snapshot.clone()),
        });

        let tick = self.tick_count.fetch_add(1, Ordering::Relaxed) + 1;
        if self.config.enable_predictive_analytics && tick % self.insight_tick_stride() == 0 {
            self.run_insight_pass();
        }

        snapshot
    }

    fn performance_block(&self, summary: &PerformanceSummary) -> PerformanceMetrics {
        let error_rate = if summary.tasks.total == 0 {
            0.0
        } else {
            summary.tasks.failed as f64 / summary.tasks.total as f64 * 100.0
        };
        let availability_percent = if summary.agents.total == 0 {
            100.0
        } else {
            (summary.agents.total - summary.agents.offline) as f64 / summary.agents.total as f64
                * 100.0
        };
        // The analytics series covers the trailing hour; lifetime average is
        // the fallback when no executions landed in the window.
        let response_time_ms = self
            .analytics
            .get_analytics(TimeRange::last_hours(1), &["task_execution_time"])
            .aggregates
            .get("task_execution_time")
            .map(|a| a.average)
            .unwrap_or(summary.tasks.average_execution_time_ms);
        PerformanceMetrics {
            response_time_ms,
            throughput: summary.tasks.throughput_per_hour,
            error_rate,
            availability_percent,
        }
    }

    /// Worst-wins health classification against the configured thresholds.
    fn classify_health(&self, memory_mb: f64, error_rate: f64) -> HealthLevel {
        let c = &self.config;
        if error_rate >= c.error_rate_critical_percent || memory_mb >= c.memory_critical_mb {
            return HealthLevel::Critical;
        }
        let error_degraded = error_rate >= c.error_rate_degraded_percent;
        let memory_degraded = memory_mb >= c.memory_degraded_mb;
        if error_degraded && memory_degraded {
            return HealthLevel::Unhealthy;
        }
        if error_degraded || memory_degraded {
            return HealthLevel::Degraded;
        }
        HealthLevel::Healthy
    }

    /// Snapshot-over-snapshot trend directions against the previous sample.
    fn compute_trends(
        &self,
        summary: &PerformanceSummary,
        performance: &PerformanceMetrics,
        health: HealthLevel,
    ) -> SnapshotTrends {
        let history = self.history.read().expect("history lock poisoned");
        let Some(previous) = history.back() else {
            return SnapshotTrends::default();
        };

        let task_load = (summary.tasks.queued + summary.tasks.in_progress) as f64;
        let previous_load =
            (previous.task_metrics.queued + previous.task_metrics.in_progress) as f64;

        SnapshotTrends {
            task_load: direction_between(previous_load, task_load),
            error_rate: direction_between(
                previous.performance_metrics.error_rate,
                performance.error_rate,
            ),
            throughput: direction_between(
                previous.task_metrics.throughput_per_hour,
                summary.tasks.throughput_per_hour,
            ),
            health: match health.cmp(&previous.system_health.overall) {
                std::cmp::Ordering::Less => QualityTrend::Improving,
                std::cmp::Ordering::Greater => QualityTrend::Degrading,
                std::cmp::Ordering::Equal => QualityTrend::Stable,
            },
        }
    }

    fn evaluate_rules(&self, snapshot: &MonitoringSnapshot) {
        let ctx = AlertContext {
            snapshot: Some(snapshot.clone()),
            event: MonitorEvent::SnapshotCollected {
                snapshot: Box::new(snapshot.clone()),
            },
        };
        let raised = self
            .rules
            .lock()
            .expect("rules lock poisoned")
            .evaluate(&ctx, Instant::now());
        for alert in raised {
            self.alerts.create_alert(alert);
        }
    }

    fn insight_tick_stride(&self) -> u64 {
        (self.config.insight_interval_ms / self.config.update_interval_ms.max(1)).max(1)
    }

    fn run_insight_pass(&self) {
        let history: Vec<MonitoringSnapshot> = {
            let history = self.history.read().expect("history lock poisoned");
            history.iter().cloned().collect()
        };
        let fresh = derive_insights(&history, &self.config);
        if fresh.is_empty() {
            return;
        }

        info!(count = fresh.len(), "predictive insights generated");
        for insight in &fresh {
            self.bus.publish(MonitorEvent::InsightGenerated {
                insight: insight.clone(),
            });
        }

        let mut insights = self.insights.write().expect("insights lock poisoned");
        for insight in fresh {
            insights.insert(0, insight);
        }
        insights.truncate(INSIGHT_CAP);
    }

    // -- Timer loop --------------------------------------------------------------

    /// Spawn the sampling loop. Runs until the shutdown signal fires.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(self);
        let mut shutdown_rx = self.shutdown.subscribe();
        tokio::spawn(async move {
            let period = Duration::from_millis(monitor.config.update_interval_ms.max(1));
            let mut ticker = tokio::time::interval(period);
            info!(?period, "realtime monitor started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        monitor.run_tick();
                    }
                    _ = shutdown_rx.recv() => {
                        info!("realtime monitor stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Stop the sampling loop after its current tick.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    // -- Queries -----------------------------------------------------------------

    /// The most recent snapshot, sampling one on demand when none exists yet.
    pub fn get_current_snapshot(&self) -> MonitoringSnapshot {
        if let Some(snapshot) = self
            .history
            .read()
            .expect("history lock poisoned")
            .back()
            .cloned()
        {
            return snapshot;
        }
        self.run_tick()
    }

    /// Snapshots from the trailing `hours`, newest first.
    pub fn get_monitoring_history(&self, hours: i64) -> Vec<MonitoringSnapshot> {
        let cutoff = Utc::now() - ChronoDuration::hours(hours);
        self.history
            .read()
            .expect("history lock poisoned")
            .iter()
            .rev()
            .filter(|s| s.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    /// Retained predictive insights, newest first.
    pub fn get_predictive_insights(&self) -> Vec<PredictiveInsight> {
        self.insights.read().expect("insights lock poisoned").clone()
    }

    /// Render monitoring history in the requested format.
    pub fn export_monitoring_data(&self, format: &str, hours: i64) -> Result<String, ExportError> {
        let history = self.get_monitoring_history(hours);
        match format {
            "json" => Ok(render_json(
                &history,
                &self.get_predictive_insights(),
                &self.alerts.get_active_alerts(None),
                Utc::now(),
            )),
            "csv" => Ok(render_csv(&history)),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

fn direction_between(previous: f64, current: f64) -> TrendDirection {
    let scale = previous.abs().max(1e-9);
    let delta = current - previous;
    if delta.abs() / scale < TREND_EPSILON {
        TrendDirection::Stable
    } else if delta > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    }
}
