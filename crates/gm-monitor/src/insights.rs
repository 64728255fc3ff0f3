use chrono::Utc;
use uuid::Uuid;

use gm_analytics::{linear_trend, TrendSummary};
use gm_core::config::SamplerConfig;
use gm_core::types::{
    ImpactLevel, InsightType, MonitoringSnapshot, PredictiveInsight, TrendDirection,
};

/// Derive predictive insights from the snapshot history.
///
/// `history` is ordered oldest to newest. Each tracked series is fitted with
/// a least-squares trend; only non-stable trends at or above the configured
/// confidence floor produce an insight.
pub fn derive_insights(
    history: &[MonitoringSnapshot],
    config: &SamplerConfig,
) -> Vec<PredictiveInsight> {
    if history.len() < config.min_insight_samples {
        return Vec::new();
    }

    let mut out = Vec::new();

    let memory: Vec<f64> = history
        .iter()
        .map(|s| s.system_health.memory_usage_mb)
        .collect();
    if let Some(trend) = qualifying(&memory, config) {
        if trend.direction == TrendDirection::Increasing {
            out.push(insight(
                InsightType::CapacityPrediction,
                "Memory usage trending upward",
                format!(
                    "Resident memory is growing at {:.2} MB per sample across the last {} samples.",
                    trend.slope, trend.samples
                ),
                "Review recent workload changes and consider raising memory limits \
                 or reducing concurrent task load.",
                impact_for_slope(trend.slope, 8.0, 32.0),
                &trend,
            ));
        }
    }

    let error_rate: Vec<f64> = history
        .iter()
        .map(|s| s.performance_metrics.error_rate)
        .collect();
    if let Some(trend) = qualifying(&error_rate, config) {
        match trend.direction {
            TrendDirection::Increasing => out.push(insight(
                InsightType::FailurePrediction,
                "Error rate trending upward",
                format!(
                    "Task error rate is rising at {:.2} percentage points per sample \
                     over {} samples.",
                    trend.slope, trend.samples
                ),
                "Inspect recently failed tasks for a common cause before the failure \
                 rate breaches alert thresholds.",
                impact_for_slope(trend.slope, 0.5, 2.0),
                &trend,
            )),
            TrendDirection::Decreasing => out.push(insight(
                InsightType::TrendAnalysis,
                "Error rate recovering",
                format!(
                    "Task error rate is falling at {:.2} percentage points per sample \
                     over {} samples.",
                    trend.slope.abs(),
                    trend.samples
                ),
                "No action required; continue monitoring until the rate stabilizes.",
                ImpactLevel::Low,
                &trend,
            )),
            TrendDirection::Stable => {}
        }
    }

    let throughput: Vec<f64> = history
        .iter()
        .map(|s| s.task_metrics.throughput_per_hour)
        .collect();
    if let Some(trend) = qualifying(&throughput, config) {
        if trend.direction == TrendDirection::Decreasing {
            out.push(insight(
                InsightType::BottleneckPrediction,
                "Throughput trending downward",
                format!(
                    "Completed tasks per hour is dropping at {:.2} per sample over {} samples.",
                    trend.slope.abs(),
                    trend.samples
                ),
                "Check for blocked tasks, saturated agents, or long-running work \
                 holding up the queue.",
                impact_for_slope(trend.slope, 0.5, 2.0),
                &trend,
            ));
        }
    }

    out
}

fn qualifying(series: &[f64], config: &SamplerConfig) -> Option<TrendSummary> {
    let trend = linear_trend(series)?;
    if trend.confidence < config.confidence_floor {
        return None;
    }
    Some(trend)
}

fn impact_for_slope(slope: f64, medium_at: f64, high_at: f64) -> ImpactLevel {
    let magnitude = slope.abs();
    if magnitude >= high_at {
        ImpactLevel::High
    } else if magnitude >= medium_at {
        ImpactLevel::Medium
    } else {
        ImpactLevel::Low
    }
}

fn insight(
    insight_type: InsightType,
    title: &str,
    description: String,
    recommendation: &str,
    impact: ImpactLevel,
    trend: &TrendSummary,
) -> PredictiveInsight {
    PredictiveInsight {
        id: Uuid::new_v4(),
        insight_type,
        title: title.to_string(),
        description,
        confidence: trend.confidence,
        time_horizon: "next hour".to_string(),
        recommendation: recommendation.to_string(),
        impact,
        data_points: trend.samples,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gm_core::types::{
        AgentMetrics, PerformanceMetrics, SnapshotTrends, SystemHealth, TaskMetrics,
    };

    fn snapshot(memory_mb: f64, error_rate: f64, throughput: f64) -> MonitoringSnapshot {
        MonitoringSnapshot {
            timestamp: Utc::now(),
            system_health: SystemHealth {
                memory_usage_mb: memory_mb,
                ..SystemHealth::default()
            },
            task_metrics: TaskMetrics {
                throughput_per_hour: throughput,
                ..TaskMetrics::default()
            },
            agent_metrics: AgentMetrics::default(),
            performance_metrics: PerformanceMetrics {
                error_rate,
                ..PerformanceMetrics::default()
            },
            trends: SnapshotTrends::default(),
            active_alerts: Vec::new(),
        }
    }

    #[test]
    fn too_little_history_yields_nothing() {
        let config = SamplerConfig::default();
        let history: Vec<_> = (0..3).map(|i| snapshot(i as f64 * 100.0, 0.0, 10.0)).collect();
        assert!(derive_insights(&history, &config).is_empty());
    }

    #[test]
    fn growing_memory_yields_capacity_prediction() {
        let config = SamplerConfig::default();
        let history: Vec<_> = (0..20)
            .map(|i| snapshot(100.0 + i as f64 * 50.0, 0.0, 10.0))
            .collect();
        let insights = derive_insights(&history, &config);
        assert!(insights
            .iter()
            .any(|i| i.insight_type == InsightType::CapacityPrediction));
    }

    #[test]
    fn rising_error_rate_yields_failure_prediction() {
        let config = SamplerConfig::default();
        let history: Vec<_> = (0..20)
            .map(|i| snapshot(100.0, i as f64 * 2.0, 10.0))
            .collect();
        let insights = derive_insights(&history, &config);
        let failure = insights
            .iter()
            .find(|i| i.insight_type == InsightType::FailurePrediction)
            .expect("failure prediction expected");
        assert!(failure.confidence >= config.confidence_floor);
        assert_eq!(failure.data_points, 20);
    }

    #[test]
    fn falling_throughput_yields_bottleneck_prediction() {
        let config = SamplerConfig::default();
        let history: Vec<_> = (0..20)
            .map(|i| snapshot(100.0, 0.0, 100.0 - i as f64 * 4.0))
            .collect();
        let insights = derive_insights(&history, &config);
        assert!(insights
            .iter()
            .any(|i| i.insight_type == InsightType::BottleneckPrediction));
    }

    #[test]
    fn stable_history_yields_nothing() {
        let config = SamplerConfig::default();
        let history: Vec<_> = (0..20).map(|_| snapshot(100.0, 1.0, 10.0)).collect();
        assert!(derive_insights(&history, &config).is_empty());
    }
}
