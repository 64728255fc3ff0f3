use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gm_alerts::{AlertContext, AlertRule, AlertSystem};
use gm_analytics::AnalyticsEngine;
use gm_bus::{EventBus, EventKind, MonitorEvent};
use gm_core::config::{AlertsConfig, AnalyticsConfig, HubConfig, SamplerConfig, TrackerConfig};
use gm_core::shutdown::ShutdownSignal;
use gm_core::types::*;
use gm_hub::{AggregatedData, DashboardSink, IntegrationHub};
use gm_monitor::{RealtimeMonitor, ResourceSample, StaticProbe};
use gm_tracker::LifecycleTracker;

struct Stack {
    hub: Arc<IntegrationHub>,
    tracker: Arc<LifecycleTracker>,
    analytics: Arc<AnalyticsEngine>,
    alerts: Arc<AlertSystem>,
    bus: EventBus,
}

fn stack(config: HubConfig) -> Stack {
    let bus = EventBus::new();
    let shutdown = ShutdownSignal::new();
    let tracker = Arc::new(LifecycleTracker::new(TrackerConfig::default(), bus.clone()));
    let analytics = Arc::new(AnalyticsEngine::new(AnalyticsConfig::default(), bus.clone()));
    let alerts = Arc::new(AlertSystem::new(AlertsConfig::default(), bus.clone()));
    let monitor = Arc::new(RealtimeMonitor::new(
        SamplerConfig::default(),
        Arc::clone(&tracker),
        Arc::clone(&analytics),
        Arc::clone(&alerts),
        Box::new(StaticProbe(ResourceSample {
            memory_mb: 64.0,
            cpu_percent: 2.0,
        })),
        bus.clone(),
        shutdown.clone(),
    ));
    let hub = Arc::new(IntegrationHub::new(
        config,
        Arc::clone(&tracker),
        Arc::clone(&analytics),
        Arc::clone(&alerts),
        monitor,
        bus.clone(),
        shutdown,
    ));
    Stack {
        hub,
        tracker,
        analytics,
        alerts,
        bus,
    }
}

fn completed_task(duration_ms: u64) -> Task {
    let mut task = Task::from_spec(TaskSpec::new(
        "t",
        TaskType::Implementation,
        TaskPriority::Normal,
    ));
    task.status = TaskStatus::Completed;
    task.actual_duration_ms = Some(duration_ms);
    task
}

fn metric_event(correlation_id: &str) -> MonitorEvent {
    MonitorEvent::MetricRecorded {
        sample: MetricSample {
            name: "custom".to_string(),
            value: 1.0,
            unit: "count".to_string(),
            category: "test".to_string(),
            timestamp: chrono::Utc::now(),
            tags: vec![("correlation_id".to_string(), correlation_id.to_string())],
        },
    }
}

#[tokio::test(start_paused = true)]
async fn routed_events_feed_analytics() {
    let s = stack(HubConfig::default());

    s.hub.route_event(&MonitorEvent::TaskCompleted {
        task: completed_task(1_500),
        correlation_id: None,
    });

    assert_eq!(s.hub.events_routed(), 1);
    // task_execution_time and task_completion_rate are derived.
    assert!(s.analytics.series_count() >= 2);
}

#[tokio::test(start_paused = true)]
async fn hub_origin_events_are_not_rerouted() {
    let s = stack(HubConfig::default());

    s.hub.route_event(&MonitorEvent::SyncCompleted {
        timestamp: chrono::Utc::now(),
    });
    s.hub.route_event(&MonitorEvent::CrossSystem {
        envelope: CrossSystemEvent {
            source: "hub".to_string(),
            event_type: "cross_system".to_string(),
            timestamp: chrono::Utc::now(),
            correlation_id: None,
            data: serde_json::Value::Null,
        },
    });

    assert_eq!(s.hub.events_routed(), 0);
}

#[tokio::test(start_paused = true)]
async fn routed_failures_reach_alert_rules() {
    let s = stack(HubConfig::default());
    s.alerts.register_rule(AlertRule::new(
        "routed_failure",
        "routed failure",
        AlertSeverity::High,
        vec![EventKind::TaskFailed],
        Duration::ZERO,
        Arc::new(|_: &AlertContext| Ok(true)),
    ));

    let mut task = completed_task(100);
    task.status = TaskStatus::Failed;
    s.hub.route_event(&MonitorEvent::TaskFailed {
        task,
        error: Some("boom".to_string()),
        correlation_id: None,
    });

    assert!(s
        .alerts
        .get_active_alerts(None)
        .iter()
        .any(|a| a.rule_id == "routed_failure"));
}

#[tokio::test(start_paused = true)]
async fn correlation_spans_component_sources() {
    let s = stack(HubConfig::default());
    let rx = s.bus.subscribe();

    let mut task = completed_task(100);
    task.status = TaskStatus::InProgress;
    s.hub.route_event(&MonitorEvent::TaskStatusChanged {
        task,
        previous: TaskStatus::Queued,
        correlation_id: Some("req-9".to_string()),
    });
    assert!(s.hub.get_correlated_events().is_empty());

    s.hub.route_event(&metric_event("req-9"));

    let correlated = s.hub.get_correlated_events();
    assert_eq!(correlated.len(), 1);
    assert_eq!(correlated[0].correlation_id, "req-9");
    assert_eq!(correlated[0].sources, vec!["analytics", "tracker"]);

    let kinds: Vec<_> = rx.try_iter().map(|e| e.kind()).collect();
    assert!(kinds.contains(&EventKind::EventsCorrelated));
}

#[tokio::test(start_paused = true)]
async fn sync_updates_sinks_and_status() {
    struct CountingSink(AtomicUsize);
    impl DashboardSink for CountingSink {
        fn update(&self, data: &AggregatedData) {
            assert!(data.generated_at <= chrono::Utc::now());
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let s = stack(HubConfig::default());
    let rx = s.bus.subscribe();
    let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
    s.hub.add_dashboard_sink(sink.clone());

    let data = s.hub.trigger_sync();
    assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    assert!(data.active_alerts.is_empty());

    let status = s.hub.get_system_status();
    assert!(status.last_sync.is_some());
    assert_eq!(status.health, HealthLevel::Healthy);
    assert_eq!(status.components.len(), 4);
    assert!(status
        .components
        .iter()
        .all(|c| c.health == HealthLevel::Healthy));

    let kinds: Vec<_> = rx.try_iter().map(|e| e.kind()).collect();
    assert!(kinds.contains(&EventKind::SyncCompleted));
}

#[tokio::test(start_paused = true)]
async fn prometheus_export_is_prefixed() {
    let s = stack(HubConfig::default());
    s.tracker
        .register_task(TaskSpec::new(
            "t",
            TaskType::Implementation,
            TaskPriority::Normal,
        ))
        .unwrap();

    let text = s.hub.export_data("prometheus", 1).unwrap();
    assert!(text.contains("# TYPE gemini_tasks_total gauge"));
    assert!(text.contains("gemini_tasks_total 1"));
    assert!(text.contains("gemini_tasks{status=\"queued\"} 1"));
    assert!(text.contains("# TYPE gemini_uptime_seconds counter"));
}

#[tokio::test(start_paused = true)]
async fn json_export_round_trips_aggregated_totals() {
    let s = stack(HubConfig::default());
    let id = s
        .tracker
        .register_task(TaskSpec::new(
            "t",
            TaskType::Implementation,
            TaskPriority::Normal,
        ))
        .unwrap();
    s.tracker
        .update_task_status(id, TaskStatus::InProgress, TaskUpdate::default());
    s.tracker
        .update_task_status(id, TaskStatus::Completed, TaskUpdate::default());

    let raw = s.hub.export_data("json", 1).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(doc["snapshot"].is_object());
    assert!(doc["dashboard"].is_object());
    assert!(doc["correlated_events"].is_array());
    assert!(doc["history"].is_array());

    // Parsed export reproduces the aggregated totals.
    let data = s.hub.get_aggregated_data();
    assert_eq!(
        doc["task_metrics"]["total"].as_u64().unwrap() as usize,
        data.snapshot.task_metrics.total
    );
    assert_eq!(
        doc["task_metrics"]["completed"].as_u64().unwrap() as usize,
        data.snapshot.task_metrics.completed
    );
    assert_eq!(
        doc["agent_metrics"]["total"].as_u64().unwrap() as usize,
        data.snapshot.agent_metrics.total
    );
}

#[tokio::test(start_paused = true)]
async fn export_respects_configuration() {
    let disabled = stack(HubConfig {
        enable_metrics_export: false,
        ..HubConfig::default()
    });
    assert_eq!(
        disabled.hub.export_data("json", 1).unwrap_err().to_string(),
        "metrics export is disabled"
    );

    let restricted = stack(HubConfig {
        export_formats: vec!["json".to_string()],
        ..HubConfig::default()
    });
    assert_eq!(
        restricted.hub.export_data("csv", 1).unwrap_err().to_string(),
        "unsupported export format: csv"
    );

    let s = stack(HubConfig::default());
    assert_eq!(
        s.hub.export_data("yaml", 1).unwrap_err().to_string(),
        "unsupported export format: yaml"
    );
}

#[tokio::test(start_paused = true)]
async fn event_loop_routes_tracker_activity() {
    let s = stack(HubConfig::default());
    let handles = s.hub.start();
    // Let the loops subscribe and take their first sync tick.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let id = s
        .tracker
        .register_task(TaskSpec::new(
            "end to end",
            TaskType::Testing,
            TaskPriority::High,
        ))
        .unwrap();
    s.tracker
        .update_task_status(id, TaskStatus::InProgress, TaskUpdate::default());
    s.tracker
        .update_task_status(id, TaskStatus::Completed, TaskUpdate::default());
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Registered + two status changes + terminal event, at minimum.
    assert!(s.hub.events_routed() >= 4);
    assert!(s.analytics.series_count() >= 1);

    s.hub.stop();
    for handle in handles {
        handle.await.unwrap();
    }
}
