use chrono::{DateTime, Utc};

use gm_core::types::{Alert, MonitoringSnapshot, PredictiveInsight};

/// Errors raised by the export surface.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The requested format is not one this exporter can render.
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),
}

/// The per-snapshot metric rows shared by the CSV renderers.
///
/// One `(name, value, unit)` triple per tracked metric; the snapshot
/// timestamp is prepended by the caller.
pub fn snapshot_metric_rows(s: &MonitoringSnapshot) -> Vec<(&'static str, f64, &'static str)> {
    vec![
        ("memory_usage_mb", s.system_health.memory_usage_mb, "mb"),
        ("cpu_usage_percent", s.system_health.cpu_usage_percent, "percent"),
        ("uptime_secs", s.system_health.uptime_secs as f64, "s"),
        ("tasks_total", s.task_metrics.total as f64, "count"),
        ("tasks_queued", s.task_metrics.queued as f64, "count"),
        ("tasks_in_progress", s.task_metrics.in_progress as f64, "count"),
        ("tasks_completed", s.task_metrics.completed as f64, "count"),
        ("tasks_failed", s.task_metrics.failed as f64, "count"),
        ("tasks_blocked", s.task_metrics.blocked as f64, "count"),
        ("tasks_cancelled", s.task_metrics.cancelled as f64, "count"),
        ("task_success_rate", s.task_metrics.success_rate, "percent"),
        (
            "average_execution_time_ms",
            s.task_metrics.average_execution_time_ms,
            "ms",
        ),
        ("throughput_per_hour", s.task_metrics.throughput_per_hour, "tasks/h"),
        ("agents_total", s.agent_metrics.total as f64, "count"),
        ("agents_active", s.agent_metrics.active as f64, "count"),
        ("agents_idle", s.agent_metrics.idle as f64, "count"),
        ("agents_busy", s.agent_metrics.busy as f64, "count"),
        ("agents_offline", s.agent_metrics.offline as f64, "count"),
        ("agent_utilization", s.agent_metrics.average_utilization, "percent"),
        ("error_rate", s.performance_metrics.error_rate, "percent"),
        (
            "availability_percent",
            s.performance_metrics.availability_percent,
            "percent",
        ),
        ("active_alerts", s.active_alerts.len() as f64, "count"),
    ]
}

/// Structured JSON dump: latest snapshot, metric roll-ups, insights, alerts.
pub fn render_json(
    snapshots: &[MonitoringSnapshot],
    insights: &[PredictiveInsight],
    alerts: &[Alert],
    exported_at: DateTime<Utc>,
) -> String {
    let latest = snapshots.first();
    let doc = serde_json::json!({
        "timestamp": exported_at,
        "snapshot": latest,
        "task_metrics": latest.map(|s| &s.task_metrics),
        "agent_metrics": latest.map(|s| &s.agent_metrics),
        "history": snapshots,
        "insights": insights,
        "alerts": alerts,
    });
    serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".to_string())
}

/// CSV dump: `timestamp,metric,value,unit`, one row per tracked metric per
/// snapshot.
pub fn render_csv(snapshots: &[MonitoringSnapshot]) -> String {
    let mut out = String::from("timestamp,metric,value,unit\n");
    for snapshot in snapshots {
        let ts = snapshot.timestamp.to_rfc3339();
        for (name, value, unit) in snapshot_metric_rows(snapshot) {
            out.push_str(&format!("{ts},{name},{value},{unit}\n"));
        }
    }
    out
}
