use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gm_alerts::{AlertContext, AlertRule, AlertSystem};
use gm_analytics::AnalyticsEngine;
use gm_bus::{EventBus, EventKind};
use gm_core::config::{AlertsConfig, AnalyticsConfig, SamplerConfig, TrackerConfig};
use gm_core::shutdown::ShutdownSignal;
use gm_core::types::*;
use gm_monitor::{RealtimeMonitor, ResourceProbe, ResourceSample, StaticProbe};
use gm_tracker::LifecycleTracker;

fn stack(
    config: SamplerConfig,
    probe: Box<dyn ResourceProbe>,
) -> (Arc<RealtimeMonitor>, Arc<LifecycleTracker>, Arc<AlertSystem>, EventBus) {
    let bus = EventBus::new();
    let tracker = Arc::new(LifecycleTracker::new(TrackerConfig::default(), bus.clone()));
    let analytics = Arc::new(AnalyticsEngine::new(AnalyticsConfig::default(), bus.clone()));
    let alerts = Arc::new(AlertSystem::new(AlertsConfig::default(), bus.clone()));
    let monitor = Arc::new(RealtimeMonitor::new(
        config,
        Arc::clone(&tracker),
        analytics,
        Arc::clone(&alerts),
        probe,
        bus.clone(),
        ShutdownSignal::new(),
    ));
    (monitor, tracker, alerts, bus)
}

fn healthy_probe() -> Box<dyn ResourceProbe> {
    Box::new(StaticProbe(ResourceSample {
        memory_mb: 128.0,
        cpu_percent: 5.0,
    }))
}

fn spec(title: &str) -> TaskSpec {
    TaskSpec::new(title, TaskType::Implementation, TaskPriority::Normal)
}

fn drive_to(tracker: &LifecycleTracker, id: uuid::Uuid, terminal: TaskStatus) {
    assert!(tracker.update_task_status(id, TaskStatus::InProgress, TaskUpdate::default()));
    assert!(tracker.update_task_status(id, terminal, TaskUpdate::default()));
}

#[tokio::test(start_paused = true)]
async fn snapshot_reflects_task_and_agent_state() {
    let (monitor, tracker, _alerts, _bus) = stack(SamplerConfig::default(), healthy_probe());

    let done = tracker.register_task(spec("done")).unwrap();
    let failed = tracker.register_task(spec("failed")).unwrap();
    tracker.register_task(spec("waiting")).unwrap();
    drive_to(&tracker, done, TaskStatus::Completed);
    drive_to(&tracker, failed, TaskStatus::Failed);

    let snapshot = monitor.run_tick();
    assert_eq!(snapshot.task_metrics.total, 3);
    assert_eq!(snapshot.task_metrics.completed, 1);
    assert_eq!(snapshot.task_metrics.failed, 1);
    assert_eq!(snapshot.task_metrics.queued, 1);
    assert!((snapshot.task_metrics.success_rate - 50.0).abs() < 1e-9);
    // One failure out of three tasks.
    assert!((snapshot.performance_metrics.error_rate - 100.0 / 3.0).abs() < 1e-9);
    assert_eq!(snapshot.system_health.overall, HealthLevel::Healthy);
}

#[tokio::test(start_paused = true)]
async fn empty_tracker_yields_benign_snapshot() {
    let (monitor, _tracker, _alerts, _bus) = stack(SamplerConfig::default(), healthy_probe());

    let snapshot = monitor.run_tick();
    assert_eq!(snapshot.task_metrics.total, 0);
    assert!((snapshot.task_metrics.success_rate - 100.0).abs() < 1e-9);
    assert_eq!(snapshot.performance_metrics.error_rate, 0.0);
    assert!((snapshot.performance_metrics.availability_percent - 100.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn built_in_failure_rule_raises_alert() {
    let (monitor, tracker, alerts, _bus) = stack(SamplerConfig::default(), healthy_probe());

    for i in 0..3 {
        let id = tracker.register_task(spec(&format!("t{i}"))).unwrap();
        drive_to(&tracker, id, TaskStatus::Failed);
    }

    monitor.run_tick();
    let active = alerts.get_active_alerts(None);
    assert!(active.iter().any(|a| a.rule_id == "high_failure_rate"));
    assert!(active.iter().any(|a| a.rule_id == "high_error_rate"));
}

#[tokio::test(start_paused = true)]
async fn custom_rule_honours_cooldown_across_ticks() {
    let (monitor, _tracker, alerts, _bus) = stack(SamplerConfig::default(), healthy_probe());
    monitor.add_alert_rule(AlertRule::new(
        "always",
        "always firing",
        AlertSeverity::Low,
        vec![EventKind::SnapshotCollected],
        Duration::from_millis(1000),
        Arc::new(|_: &AlertContext| Ok(true)),
    ));

    // Ticks every 100ms; the rule must fire once, then again after 1000ms.
    for _ in 0..3 {
        monitor.run_tick();
        tokio::time::advance(Duration::from_millis(100)).await;
    }
    let count = |alerts: &AlertSystem| {
        alerts
            .get_active_alerts(None)
            .iter()
            .filter(|a| a.rule_id == "always")
            .count()
    };
    assert_eq!(count(&alerts), 1);

    tokio::time::advance(Duration::from_millis(900)).await;
    monitor.run_tick();
    assert_eq!(count(&alerts), 2);
}

#[tokio::test(start_paused = true)]
async fn probe_failure_degrades_to_zeroed_resources() {
    struct FailingProbe;
    impl ResourceProbe for FailingProbe {
        fn sample(&self) -> anyhow::Result<ResourceSample> {
            anyhow::bail!("probe backend unavailable")
        }
    }

    let (monitor, _tracker, _alerts, _bus) = stack(SamplerConfig::default(), Box::new(FailingProbe));
    let snapshot = monitor.run_tick();
    assert_eq!(snapshot.system_health.memory_usage_mb, 0.0);
    assert_eq!(snapshot.system_health.cpu_usage_percent, 0.0);
    assert_eq!(snapshot.system_health.overall, HealthLevel::Healthy);
}

#[tokio::test(start_paused = true)]
async fn critical_memory_flips_health_and_alerts() {
    let probe = Box::new(StaticProbe(ResourceSample {
        memory_mb: 5_000.0,
        cpu_percent: 10.0,
    }));
    let (monitor, _tracker, alerts, _bus) = stack(SamplerConfig::default(), probe);

    let snapshot = monitor.run_tick();
    assert_eq!(snapshot.system_health.overall, HealthLevel::Critical);
    assert!(alerts
        .get_active_alerts(None)
        .iter()
        .any(|a| a.rule_id == "critical_memory_usage"));
}

#[tokio::test(start_paused = true)]
async fn built_in_rules_use_configured_default_cooldown() {
    let bus = EventBus::new();
    let tracker = Arc::new(LifecycleTracker::new(TrackerConfig::default(), bus.clone()));
    let analytics = Arc::new(AnalyticsEngine::new(AnalyticsConfig::default(), bus.clone()));
    let alerts = Arc::new(AlertSystem::new(
        AlertsConfig {
            default_cooldown_ms: 300,
            ..AlertsConfig::default()
        },
        bus.clone(),
    ));
    let monitor = Arc::new(RealtimeMonitor::new(
        SamplerConfig::default(),
        Arc::clone(&tracker),
        analytics,
        Arc::clone(&alerts),
        Box::new(StaticProbe(ResourceSample {
            memory_mb: 5_000.0,
            cpu_percent: 10.0,
        })),
        bus.clone(),
        ShutdownSignal::new(),
    ));
    let count = |alerts: &AlertSystem| {
        alerts
            .get_active_alerts(None)
            .iter()
            .filter(|a| a.rule_id == "critical_memory_usage")
            .count()
    };

    monitor.run_tick();
    tokio::time::advance(Duration::from_millis(100)).await;
    monitor.run_tick();
    assert_eq!(count(&alerts), 1);

    tokio::time::advance(Duration::from_millis(250)).await;
    monitor.run_tick();
    assert_eq!(count(&alerts), 2);
}

#[tokio::test(start_paused = true)]
async fn degraded_memory_is_not_critical() {
    let probe = Box::new(StaticProbe(ResourceSample {
        memory_mb: 2_000.0,
        cpu_percent: 10.0,
    }));
    let (monitor, _tracker, _alerts, _bus) = stack(SamplerConfig::default(), probe);
    assert_eq!(monitor.run_tick().system_health.overall, HealthLevel::Degraded);
}

#[tokio::test(start_paused = true)]
async fn export_rejects_unknown_format() {
    let (monitor, _tracker, _alerts, _bus) = stack(SamplerConfig::default(), healthy_probe());
    monitor.run_tick();

    let err = monitor.export_monitoring_data("xml", 1).unwrap_err();
    assert_eq!(err.to_string(), "unsupported export format: xml");
}

#[tokio::test(start_paused = true)]
async fn csv_export_shape() {
    let (monitor, _tracker, _alerts, _bus) = stack(SamplerConfig::default(), healthy_probe());
    monitor.run_tick();

    let csv = monitor.export_monitoring_data("csv", 1).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("timestamp,metric,value,unit"));
    assert!(csv.contains(",memory_usage_mb,128,"));
    assert!(csv.contains(",tasks_total,0,count"));
}

#[tokio::test(start_paused = true)]
async fn json_export_is_well_formed() {
    let (monitor, _tracker, _alerts, _bus) = stack(SamplerConfig::default(), healthy_probe());
    monitor.run_tick();
    monitor.run_tick();

    let raw = monitor.export_monitoring_data("json", 1).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(doc["snapshot"].is_object());
    assert_eq!(doc["history"].as_array().unwrap().len(), 2);
    assert!(doc["alerts"].is_array());
}

#[tokio::test(start_paused = true)]
async fn history_is_newest_first_and_capped() {
    let config = SamplerConfig {
        history_cap: 5,
        ..SamplerConfig::default()
    };
    let (monitor, _tracker, _alerts, _bus) = stack(config, healthy_probe());

    for _ in 0..8 {
        monitor.run_tick();
    }
    let history = monitor.get_monitoring_history(1);
    assert_eq!(history.len(), 5);
    for pair in history.windows(2) {
        assert!(pair[0].timestamp >= pair[1].timestamp);
    }
}

#[tokio::test(start_paused = true)]
async fn insights_require_minimum_history() {
    let config = SamplerConfig {
        update_interval_ms: 100,
        insight_interval_ms: 100,
        min_insight_samples: 12,
        ..SamplerConfig::default()
    };
    let (monitor, _tracker, _alerts, _bus) = stack(config, healthy_probe());

    for _ in 0..5 {
        monitor.run_tick();
    }
    assert!(monitor.get_predictive_insights().is_empty());
}

#[tokio::test(start_paused = true)]
async fn growing_memory_produces_capacity_insight() {
    struct GrowingProbe(AtomicU64);
    impl ResourceProbe for GrowingProbe {
        fn sample(&self) -> anyhow::Result<ResourceSample> {
            let step = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ResourceSample {
                memory_mb: 100.0 + step as f64 * 50.0,
                cpu_percent: 5.0,
            })
        }
    }

    let config = SamplerConfig {
        update_interval_ms: 100,
        insight_interval_ms: 100,
        min_insight_samples: 5,
        ..SamplerConfig::default()
    };
    let (monitor, _tracker, _alerts, bus) = stack(config, Box::new(GrowingProbe(AtomicU64::new(0))));
    let rx = bus.subscribe();

    for _ in 0..20 {
        monitor.run_tick();
    }
    let insights = monitor.get_predictive_insights();
    assert!(insights
        .iter()
        .any(|i| i.insight_type == InsightType::CapacityPrediction));

    let kinds: Vec<_> = rx.try_iter().map(|e| e.kind()).collect();
    assert!(kinds.contains(&EventKind::InsightGenerated));
}

#[tokio::test(start_paused = true)]
async fn get_current_snapshot_samples_on_demand() {
    let (monitor, _tracker, _alerts, _bus) = stack(SamplerConfig::default(), healthy_probe());
    let snapshot = monitor.get_current_snapshot();
    assert_eq!(snapshot.task_metrics.total, 0);
    assert_eq!(monitor.get_monitoring_history(1).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn sampling_loop_runs_until_stopped() {
    let config = SamplerConfig {
        update_interval_ms: 100,
        ..SamplerConfig::default()
    };
    let (monitor, _tracker, _alerts, bus) = stack(config, healthy_probe());
    let rx = bus.subscribe_to(&[EventKind::SnapshotCollected]);

    let handle = monitor.start();
    tokio::time::sleep(Duration::from_millis(550)).await;
    monitor.stop();
    handle.await.unwrap();

    let snapshots = rx.try_iter().count();
    assert!(snapshots >= 5);
    assert!(!monitor.get_monitoring_history(1).is_empty());
}
