use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for a monitoring stack instance.
///
/// Every section has serde defaults so a partial (or empty) TOML document
/// yields a fully usable configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MonitorConfig {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub monitor: SamplerConfig,
    #[serde(default)]
    pub hub: HubConfig,
}

impl MonitorConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config = toml::from_str(raw)?;
        Ok(config)
    }

    /// Load a configuration from a TOML file on disk.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum status-history entries retained per task, newest-first.
    pub status_history_cap: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            status_history_cap: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// How long metric points are retained, in days.
    pub retention_days: i64,
    /// Hard cap on points per metric series.
    pub series_point_cap: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            series_point_cap: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Cooldown applied to rules installed without their own, including the
    /// sampler's built-in rule set.
    pub default_cooldown_ms: u64,
    /// Maximum resolved/terminal alerts kept for analytics queries.
    pub alert_history_cap: usize,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            default_cooldown_ms: 60_000,
            alert_history_cap: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Sampling tick interval.
    pub update_interval_ms: u64,
    /// Maximum snapshots retained in the history ring.
    pub history_cap: usize,
    /// How often the insight pass runs, expressed in wall time.
    pub insight_interval_ms: u64,
    /// Minimum snapshots required before insights are attempted.
    pub min_insight_samples: usize,
    /// Confidence floor below which an insight is discarded.
    pub confidence_floor: f64,
    pub enable_anomaly_detection: bool,
    pub enable_predictive_analytics: bool,
    /// Error-rate percentage at which health degrades / goes critical.
    pub error_rate_degraded_percent: f64,
    pub error_rate_critical_percent: f64,
    /// Memory thresholds for the health decision table.
    pub memory_degraded_mb: f64,
    pub memory_critical_mb: f64,
    /// Heartbeats older than this mark an agent stale.
    pub stale_heartbeat_secs: i64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 500,
            history_cap: 2_016,
            insight_interval_ms: 300_000,
            min_insight_samples: 12,
            confidence_floor: 0.5,
            enable_anomaly_detection: true,
            enable_predictive_analytics: true,
            error_rate_degraded_percent: 10.0,
            error_rate_critical_percent: 50.0,
            memory_degraded_mb: 1_024.0,
            memory_critical_mb: 4_096.0,
            stale_heartbeat_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Cross-component sync cadence.
    pub sync_interval_ms: u64,
    /// How long a correlation id waits for siblings before eviction.
    pub correlation_window_ms: u64,
    /// Maximum correlated events retained for queries.
    pub correlated_event_cap: usize,
    pub enable_data_persistence: bool,
    pub enable_metrics_export: bool,
    /// Formats `export_data` is allowed to serve.
    pub export_formats: Vec<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: 1_000,
            correlation_window_ms: 5_000,
            correlated_event_cap: 500,
            enable_data_persistence: false,
            enable_metrics_export: true,
            export_formats: vec![
                "json".to_string(),
                "csv".to_string(),
                "prometheus".to_string(),
            ],
        }
    }
}
