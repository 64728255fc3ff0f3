use std::fmt::Write;

use gm_core::types::MonitoringSnapshot;

/// Errors raised by the hub export surface.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("metrics export is disabled")]
    Disabled,
}

fn gauge(out: &mut String, name: &str, value: f64) {
    let _ = writeln!(out, "# TYPE gemini_{name} gauge");
    let _ = writeln!(out, "gemini_{name} {value}");
}

fn counter(out: &mut String, name: &str, value: f64) {
    let _ = writeln!(out, "# TYPE gemini_{name} counter");
    let _ = writeln!(out, "gemini_{name} {value}");
}

fn labelled_gauge(out: &mut String, name: &str, rows: &[(&str, f64)]) {
    let _ = writeln!(out, "# TYPE gemini_{name} gauge");
    for (label, value) in rows {
        let _ = writeln!(out, "gemini_{name}{{status=\"{label}\"}} {value}");
    }
}

/// Render the latest snapshot in the Prometheus text exposition format.
///
/// Every metric carries the `gemini_` prefix so scrapes from co-located
/// exporters never collide.
pub fn render_prometheus(snapshot: &MonitoringSnapshot, events_routed: u64) -> String {
    let mut out = String::new();
    let t = &snapshot.task_metrics;
    let a = &snapshot.agent_metrics;
    let p = &snapshot.performance_metrics;

    gauge(&mut out, "tasks_total", t.total as f64);
    labelled_gauge(
        &mut out,
        "tasks",
        &[
            ("queued", t.queued as f64),
            ("in_progress", t.in_progress as f64),
            ("completed", t.completed as f64),
            ("failed", t.failed as f64),
            ("blocked", t.blocked as f64),
            ("cancelled", t.cancelled as f64),
        ],
    );
    gauge(&mut out, "task_success_rate", t.success_rate);
    gauge(&mut out, "task_execution_time_ms", t.average_execution_time_ms);
    gauge(&mut out, "task_throughput_per_hour", t.throughput_per_hour);

    gauge(&mut out, "agents_total", a.total as f64);
    labelled_gauge(
        &mut out,
        "agents",
        &[
            ("active", a.active as f64),
            ("idle", a.idle as f64),
            ("busy", a.busy as f64),
            ("offline", a.offline as f64),
        ],
    );
    gauge(&mut out, "agent_utilization_percent", a.average_utilization);

    gauge(&mut out, "memory_usage_mb", snapshot.system_health.memory_usage_mb);
    gauge(&mut out, "cpu_usage_percent", snapshot.system_health.cpu_usage_percent);
    gauge(&mut out, "error_rate_percent", p.error_rate);
    gauge(&mut out, "availability_percent", p.availability_percent);
    gauge(&mut out, "active_alerts", snapshot.active_alerts.len() as f64);

    counter(&mut out, "uptime_seconds", snapshot.system_health.uptime_secs as f64);
    counter(&mut out, "events_routed_total", events_routed as f64);

    out
}
