use gm_analytics::{AnalyticsEngine, BenchmarkStatus, TimeRange};
use gm_bus::{EventBus, MonitorEvent};
use gm_core::config::AnalyticsConfig;
use gm_core::types::*;

fn engine() -> AnalyticsEngine {
    AnalyticsEngine::new(AnalyticsConfig::default(), EventBus::new())
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

#[test]
fn record_metric_publishes_sample() {
    let bus = EventBus::new();
    let rx = bus.subscribe();
    let engine = AnalyticsEngine::new(AnalyticsConfig::default(), bus);

    engine.record_metric("lint_score", 92.0, "percent", "quality", vec![]);

    match rx.try_recv().unwrap() {
        MonitorEvent::MetricRecorded { sample } => {
            assert_eq!(sample.name, "lint_score");
            assert_eq!(sample.value, 92.0);
            assert_eq!(sample.unit, "percent");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn dashboard_reports_latest_value() {
    let engine = engine();
    engine.record_metric("queue_depth", 4.0, "count", "tasks", vec![]);
    engine.record_metric("queue_depth", 9.0, "count", "tasks", vec![]);

    let dashboard = engine.get_dashboard_data();
    let metric = dashboard
        .metrics
        .iter()
        .find(|m| m.name == "queue_depth")
        .expect("metric present");
    assert_eq!(metric.latest, 9.0);
    // Two points: below the trend minimum, so no trend is reported.
    assert!(metric.trend.is_none());
}

#[test]
fn completion_rate_derived_from_terminal_events() {
    let engine = engine();
    engine.ingest_event(&MonitorEvent::TaskCompleted {
        task: completed_task(1_000),
        correlation_id: None,
    });
    engine.ingest_event(&MonitorEvent::TaskFailed {
        task: completed_task(1_000),
        error: Some("boom".into()),
        correlation_id: None,
    });

    let dashboard = engine.get_dashboard_data();
    let rate = dashboard
        .metrics
        .iter()
        .find(|m| m.name == "task_completion_rate")
        .expect("rate derived");
    assert_eq!(rate.latest, 50.0);
    assert_eq!(rate.benchmark, Some(BenchmarkStatus::Critical));

    let exec = dashboard
        .metrics
        .iter()
        .find(|m| m.name == "task_execution_time")
        .expect("execution time derived");
    assert_eq!(exec.latest, 1_000.0);
    assert_eq!(exec.benchmark, Some(BenchmarkStatus::Good));
}

#[test]
fn analytics_range_aggregates() {
    let engine = engine();
    for v in [2.0, 4.0, 6.0] {
        engine.record_metric("memory_mb", v, "mb", "system", vec![]);
    }

    let report = engine.get_analytics(TimeRange::last_hours(1), &["memory_mb"]);
    let agg = report.aggregates.get("memory_mb").expect("aggregate");
    assert_eq!(agg.min, 2.0);
    assert_eq!(agg.max, 6.0);
    assert_eq!(agg.average, 4.0);
    assert_eq!(agg.count, 3);
    assert_eq!(report.series.get("memory_mb").unwrap().len(), 3);
}

#[test]
fn analytics_filters_by_name() {
    let engine = engine();
    engine.record_metric("a", 1.0, "count", "x", vec![]);
    engine.record_metric("b", 1.0, "count", "x", vec![]);

    let report = engine.get_analytics(TimeRange::last_hours(1), &["a"]);
    assert!(report.series.contains_key("a"));
    assert!(!report.series.contains_key("b"));
}

#[test]
fn out_of_range_points_are_excluded() {
    let engine = engine();
    engine.record_metric("m", 1.0, "count", "x", vec![]);

    let past = TimeRange {
        from: chrono::Utc::now() - chrono::Duration::hours(4),
        to: chrono::Utc::now() - chrono::Duration::hours(2),
    };
    let report = engine.get_analytics(past, &[]);
    assert!(report.series.is_empty());
}

#[test]
fn recommendations_fire_on_threshold_cross() {
    let engine = engine();
    // One failure, zero completions: completion rate 0% -> critical.
    engine.ingest_event(&MonitorEvent::TaskFailed {
        task: completed_task(1_000),
        error: None,
        correlation_id: None,
    });

    let recs = engine.generate_optimization_recommendations();
    assert!(recs.iter().any(|r| r.metric == "task_completion_rate"));
    assert!(recs
        .iter()
        .all(|r| r.impact >= gm_core::types::ImpactLevel::Medium));
}

#[test]
fn healthy_metrics_produce_no_recommendations() {
    let engine = engine();
    for _ in 0..20 {
        engine.ingest_event(&MonitorEvent::TaskCompleted {
            task: completed_task(500),
            correlation_id: None,
        });
    }
    let recs = engine.generate_optimization_recommendations();
    assert!(recs.is_empty());
}

#[test]
fn series_point_cap_is_enforced() {
    let config = AnalyticsConfig {
        retention_days: 30,
        series_point_cap: 5,
    };
    let engine = AnalyticsEngine::new(config, EventBus::new());
    for i in 0..10 {
        engine.record_metric("capped", i as f64, "count", "x", vec![]);
    }
    let report = engine.get_analytics(TimeRange::last_hours(1), &["capped"]);
    assert_eq!(report.series.get("capped").unwrap().len(), 5);
    // Oldest points evicted first.
    assert_eq!(report.series.get("capped").unwrap()[0].value, 5.0);
}
