use std::collections::VecDeque;
use std::sync::RwLock;

use ahash::AHashMap;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use gm_bus::{EventBus, MonitorEvent};
use gm_core::config::AnalyticsConfig;
use gm_core::types::{ImpactLevel, MetricSample};

use crate::trend::{linear_trend, TrendSummary};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkStatus {
    Good,
    Warning,
    Critical,
}

/// Thresholds a metric's latest value is classified against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkTarget {
    pub good: f64,
    pub warning: f64,
    pub higher_is_better: bool,
}

impl BenchmarkTarget {
    pub fn classify(&self, value: f64) -> BenchmarkStatus {
        if self.higher_is_better {
            if value >= self.good {
                BenchmarkStatus::Good
            } else if value >= self.warning {
                BenchmarkStatus::Warning
            } else {
                BenchmarkStatus::Critical
            }
        } else if value <= self.good {
            BenchmarkStatus::Good
        } else if value <= self.warning {
            BenchmarkStatus::Warning
        } else {
            BenchmarkStatus::Critical
        }
    }
}

fn default_benchmarks() -> AHashMap<String, BenchmarkTarget> {
    let mut targets = AHashMap::new();
    targets.insert(
        "task_completion_rate".to_string(),
        BenchmarkTarget {
            good: 95.0,
            warning: 80.0,
            higher_is_better: true,
        },
    );
    targets.insert(
        "task_execution_time".to_string(),
        BenchmarkTarget {
            good: 60_000.0,
            warning: 300_000.0,
            higher_is_better: false,
        },
    );
    targets.insert(
        "task_failure_count".to_string(),
        BenchmarkTarget {
            good: 0.0,
            warning: 3.0,
            higher_is_better: false,
        },
    );
    targets
}

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    /// The trailing `hours` up to now.
    pub fn last_hours(hours: i64) -> Self {
        let to = Utc::now();
        Self {
            from: to - ChronoDuration::hours(hours),
            to,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at <= self.to
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricPoint {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregate {
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardMetric {
    pub name: String,
    pub unit: String,
    pub category: String,
    pub latest: f64,
    pub trend: Option<TrendSummary>,
    pub benchmark: Option<BenchmarkStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardData {
    pub generated_at: DateTime<Utc>,
    pub metrics: Vec<DashboardMetric>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub range: TimeRange,
    pub series: AHashMap<String, Vec<MetricPoint>>,
    pub aggregates: AHashMap<String, Aggregate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub metric: String,
    pub impact: ImpactLevel,
    pub message: String,
    pub suggested_action: String,
}

// ---------------------------------------------------------------------------
// AnalyticsEngine
// ---------------------------------------------------------------------------

struct MetricSeries {
    unit: String,
    category: String,
    points: VecDeque<MetricPoint>,
}

/// Ingests named metrics and lifecycle events, keeping a bounded time series
/// per metric name.
pub struct AnalyticsEngine {
    series: RwLock<AHashMap<String, MetricSeries>>,
    benchmarks: AHashMap<String, BenchmarkTarget>,
    retention: ChronoDuration,
    point_cap: usize,
    bus: EventBus,
    // Running terminal-task counters used to derive task_completion_rate.
    terminal_counts: RwLock<(u64, u64)>,
}

impl AnalyticsEngine {
    pub fn new(config: AnalyticsConfig, bus: EventBus) -> Self {
        Self {
            series: RwLock::new(AHashMap::new()),
            benchmarks: default_benchmarks(),
            retention: ChronoDuration::days(config.retention_days.max(1)),
            point_cap: config.series_point_cap.max(1),
            bus,
            terminal_counts: RwLock::new((0, 0)),
        }
    }

    /// Override or add a benchmark target for a metric name.
    pub fn set_benchmark(&mut self, name: impl Into<String>, target: BenchmarkTarget) {
        self.benchmarks.insert(name.into(), target);
    }

    // -- Ingestion -------------------------------------------------------------

    /// Record one observation of a named metric and publish it on the bus.
    pub fn record_metric(
        &self,
        name: &str,
        value: f64,
        unit: &str,
        category: &str,
        tags: Vec<(String, String)>,
    ) {
        let timestamp = Utc::now();
        self.push_point(name, value, unit, category, timestamp);

        self.bus.publish(MonitorEvent::MetricRecorded {
            sample: MetricSample {
                name: name.to_string(),
                value,
                unit: unit.to_string(),
                category: category.to_string(),
                timestamp,
                tags,
            },
        });
    }

    /// Translate a lifecycle event into derived metrics.
    ///
    /// Metric samples republished by this engine are ignored here so the
    /// hub can route every bus event through without feedback.
    pub fn ingest_event(&self, event: &MonitorEvent) {
        match event {
            MonitorEvent::TaskCompleted { task, .. } => {
                if let Some(duration) = task.actual_duration_ms {
                    self.push_point(
                        "task_execution_time",
                        duration as f64,
                        "ms",
                        "tasks",
                        Utc::now(),
                    );
                }
                self.bump_terminal(true);
            }
            MonitorEvent::TaskFailed { .. } => {
                self.push_point("task_failure_count", 1.0, "count", "tasks", Utc::now());
                self.bump_terminal(false);
            }
            MonitorEvent::AgentHeartbeat { agent } => {
                self.push_point(
                    "agent_throughput",
                    agent.performance.task_throughput,
                    "tasks/h",
                    "agents",
                    Utc::now(),
                );
            }
            _ => {}
        }
    }

    fn bump_terminal(&self, completed: bool) {
        let rate = {
            let mut counts = self.terminal_counts.write().expect("counts lock poisoned");
            if completed {
                counts.0 += 1;
            } else {
                counts.1 += 1;
            }
            counts.0 as f64 / (counts.0 + counts.1) as f64 * 100.0
        };
        self.push_point("task_completion_rate", rate, "percent", "tasks", Utc::now());
    }

    fn push_point(
        &self,
        name: &str,
        value: f64,
        unit: &str,
        category: &str,
        timestamp: DateTime<Utc>,
    ) {
        let mut series = self.series.write().expect("series lock poisoned");
        let entry = series.entry(name.to_string()).or_insert_with(|| MetricSeries {
            unit: unit.to_string(),
            category: category.to_string(),
            points: VecDeque::new(),
        });
        entry.points.push_back(MetricPoint { value, timestamp });

        // Retention: drop by age, then enforce the hard point cap.
        let cutoff = timestamp - self.retention;
        while entry
            .points
            .front()
            .is_some_and(|p| p.timestamp < cutoff)
        {
            entry.points.pop_front();
        }
        while entry.points.len() > self.point_cap {
            entry.points.pop_front();
        }
    }

    // -- Queries -----------------------------------------------------------------

    /// Latest value per metric plus trend classification and benchmark status.
    pub fn get_dashboard_data(&self) -> DashboardData {
        let series = self.series.read().expect("series lock poisoned");
        let mut metrics: Vec<DashboardMetric> = series
            .iter()
            .filter_map(|(name, s)| {
                let latest = s.points.back()?.value;
                let window: Vec<f64> = s
                    .points
                    .iter()
                    .rev()
                    .take(20)
                    .rev()
                    .map(|p| p.value)
                    .collect();
                Some(DashboardMetric {
                    name: name.clone(),
                    unit: s.unit.clone(),
                    category: s.category.clone(),
                    latest,
                    trend: linear_trend(&window),
                    benchmark: self.benchmarks.get(name).map(|t| t.classify(latest)),
                })
            })
            .collect();
        metrics.sort_by(|a, b| a.name.cmp(&b.name));

        DashboardData {
            generated_at: Utc::now(),
            metrics,
        }
    }

    /// Raw series plus min/max/average aggregations over a range.
    ///
    /// An empty `names` slice selects every tracked metric.
    pub fn get_analytics(&self, range: TimeRange, names: &[&str]) -> AnalyticsReport {
        let series = self.series.read().expect("series lock poisoned");
        let mut out_series = AHashMap::new();
        let mut aggregates = AHashMap::new();

        for (name, s) in series.iter() {
            if !names.is_empty() && !names.contains(&name.as_str()) {
                continue;
            }
            let points: Vec<MetricPoint> = s
                .points
                .iter()
                .filter(|p| range.contains(p.timestamp))
                .cloned()
                .collect();
            if points.is_empty() {
                continue;
            }
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            let mut sum = 0.0;
            for p in &points {
                min = min.min(p.value);
                max = max.max(p.value);
                sum += p.value;
            }
            aggregates.insert(
                name.clone(),
                Aggregate {
                    min,
                    max,
                    average: sum / points.len() as f64,
                    count: points.len(),
                },
            );
            out_series.insert(name.clone(), points);
        }

        AnalyticsReport {
            range,
            series: out_series,
            aggregates,
        }
    }

    /// Rule-based suggestions for metrics that crossed their thresholds.
    pub fn generate_optimization_recommendations(&self) -> Vec<Recommendation> {
        let dashboard = self.get_dashboard_data();
        let mut recommendations = Vec::new();

        for metric in &dashboard.metrics {
            let Some(status) = metric.benchmark else {
                continue;
            };
            let impact = match status {
                BenchmarkStatus::Good => continue,
                BenchmarkStatus::Warning => ImpactLevel::Medium,
                BenchmarkStatus::Critical => ImpactLevel::High,
            };
            let (message, suggested_action) = match metric.name.as_str() {
                "task_completion_rate" => (
                    format!(
                        "task completion rate at {:.1}% is below target",
                        metric.latest
                    ),
                    "inspect recent task failures and rebalance agent assignments".to_string(),
                ),
                "task_execution_time" => (
                    format!(
                        "average task execution time {:.0}ms exceeds target",
                        metric.latest
                    ),
                    "split long-running tasks or raise agent concurrency".to_string(),
                ),
                "task_failure_count" => (
                    "task failures are accumulating".to_string(),
                    "review failing task error payloads before retrying".to_string(),
                ),
                other => (
                    format!("{} is outside its configured target band", other),
                    "review the metric's recent series for the regression point".to_string(),
                ),
            };
            recommendations.push(Recommendation {
                metric: metric.name.clone(),
                impact,
                message,
                suggested_action,
            });
        }

        debug!(count = recommendations.len(), "optimization recommendations generated");
        recommendations
    }

    /// Number of tracked metric series.
    pub fn series_count(&self) -> usize {
        self.series.read().expect("series lock poisoned").len()
    }
}
