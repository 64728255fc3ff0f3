use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use gm_bus::{EventBus, MonitorEvent};
use gm_core::config::AlertsConfig;
use gm_core::types::{
    Agent, AgentStatus, Alert, AlertSeverity, AlertStatus, MonitoringSnapshot, Task, TaskStatus,
    TaskUpdate, TrendDirection,
};

use crate::rules::{AlertContext, AlertRule, RuleSet};

// ---------------------------------------------------------------------------
// Notification channels
// ---------------------------------------------------------------------------

/// A pluggable delivery channel for raised alerts.
///
/// Channels are registered by name; a rule's actions reference them by that
/// name with channel-specific configuration.
pub trait NotificationChannel: Send + Sync {
    fn notify(&self, alert: &Alert, config: &serde_json::Value);
}

/// Built-in channel that emits a structured log line per alert.
pub struct ConsoleChannel;

impl NotificationChannel for ConsoleChannel {
    fn notify(&self, alert: &Alert, _config: &serde_json::Value) {
        warn!(
            alert_id = %alert.id,
            rule_id = %alert.rule_id,
            severity = ?alert.severity,
            title = %alert.title,
            source = %alert.source,
            "alert raised"
        );
    }
}

// ---------------------------------------------------------------------------
// Query / analytics types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub severity: Option<AlertSeverity>,
    pub category: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AlertAnalytics {
    pub window_hours: i64,
    pub total: usize,
    pub by_severity: HashMap<AlertSeverity, usize>,
    pub by_category: HashMap<String, usize>,
    pub trend: TrendDirection,
    pub mean_time_to_acknowledge_ms: Option<f64>,
    pub mean_time_to_resolve_ms: Option<f64>,
}

struct Suppression {
    pattern: String,
    until: Instant,
}

// ---------------------------------------------------------------------------
// AlertSystem
// ---------------------------------------------------------------------------

/// Owns rule definitions, evaluates them against lifecycle events, and
/// manages the lifecycle of raised alerts.
pub struct AlertSystem {
    rules: Mutex<RuleSet>,
    alerts: RwLock<Vec<Alert>>,
    suppressions: Mutex<Vec<Suppression>>,
    channels: DashMap<String, Arc<dyn NotificationChannel>>,
    latest_snapshot: RwLock<Option<MonitoringSnapshot>>,
    history_cap: usize,
    default_cooldown: Duration,
    bus: EventBus,
}

impl AlertSystem {
    pub fn new(config: AlertsConfig, bus: EventBus) -> Self {
        let channels: DashMap<String, Arc<dyn NotificationChannel>> = DashMap::new();
        channels.insert("console".to_string(), Arc::new(ConsoleChannel));
        Self {
            rules: Mutex::new(RuleSet::new()),
            alerts: RwLock::new(Vec::new()),
            suppressions: Mutex::new(Vec::new()),
            channels,
            latest_snapshot: RwLock::new(None),
            history_cap: config.alert_history_cap.max(1),
            default_cooldown: Duration::from_millis(config.default_cooldown_ms),
            bus,
        }
    }

    /// Configured cooldown for rules installed without their own, such as
    /// the sampler's built-in rule set.
    pub fn default_cooldown(&self) -> Duration {
        self.default_cooldown
    }

    /// Register an additional notification channel under `name`.
    pub fn register_channel(&self, name: impl Into<String>, channel: Arc<dyn NotificationChannel>) {
        self.channels.insert(name.into(), channel);
    }

    // -- Rule registry (idempotent CRUD) ---------------------------------------

    pub fn register_rule(&self, rule: AlertRule) {
        let replaced = self.rules.lock().expect("rules lock poisoned").upsert(rule);
        debug!(replaced, "alert rule registered");
    }

    /// Same upsert semantics as `register_rule`; kept as a separate entry
    /// point to mirror the registry contract.
    pub fn update_rule(&self, rule: AlertRule) {
        self.register_rule(rule);
    }

    pub fn delete_rule(&self, id: &str) -> bool {
        self.rules.lock().expect("rules lock poisoned").remove(id)
    }

    pub fn get_alert_rules(&self) -> Vec<AlertRule> {
        self.rules.lock().expect("rules lock poisoned").rules()
    }

    /// Record the latest snapshot so rule conditions can inspect it.
    pub fn observe_snapshot(&self, snapshot: MonitoringSnapshot) {
        *self
            .latest_snapshot
            .write()
            .expect("snapshot lock poisoned") = Some(snapshot);
    }

    // -- Event-driven evaluation -------------------------------------------------

    /// Evaluate rules against an incoming task status transition.
    pub fn process_task_status_update(&self, task: &Task, previous: TaskStatus, update: &TaskUpdate) {
        let event = MonitorEvent::TaskStatusChanged {
            task: task.clone(),
            previous,
            correlation_id: update.correlation_id.clone(),
        };
        self.process_event(&event);

        match task.status {
            TaskStatus::Completed => self.process_event(&MonitorEvent::TaskCompleted {
                task: task.clone(),
                correlation_id: update.correlation_id.clone(),
            }),
            TaskStatus::Failed => self.process_event(&MonitorEvent::TaskFailed {
                task: task.clone(),
                error: update.error.clone(),
                correlation_id: update.correlation_id.clone(),
            }),
            _ => {}
        }
    }

    /// Evaluate rules against an agent status/heartbeat update.
    pub fn process_agent_status_update(&self, agent: &Agent, previous: AgentStatus) {
        if agent.status != previous {
            self.process_event(&MonitorEvent::AgentStatusChanged {
                agent: agent.clone(),
                previous,
            });
        } else {
            self.process_event(&MonitorEvent::AgentHeartbeat {
                agent: agent.clone(),
            });
        }
    }

    /// Evaluate every enabled rule triggered by `event`.
    pub fn process_event(&self, event: &MonitorEvent) {
        let ctx = AlertContext {
            snapshot: self
                .latest_snapshot
                .read()
                .expect("snapshot lock poisoned")
                .clone(),
            event: event.clone(),
        };
        let raised = self
            .rules
            .lock()
            .expect("rules lock poisoned")
            .evaluate(&ctx, Instant::now());

        for alert in raised {
            self.create_alert(alert);
        }
    }

    // -- Alert lifecycle -----------------------------------------------------------

    /// Store a new alert, run its rule's notification actions, and publish
    /// an alert-created event. Returns `None` when a suppression filter
    /// blocks the alert.
    pub fn create_alert(&self, alert: Alert) -> Option<Uuid> {
        if self.is_suppressed(&alert.title) {
            debug!(title = %alert.title, "alert suppressed by active filter");
            return None;
        }

        let id = alert.id;
        self.notify(&alert);

        {
            let mut alerts = self.alerts.write().expect("alerts lock poisoned");
            alerts.push(alert.clone());
            // Evict oldest resolved alerts beyond the retention cap.
            if alerts.len() > self.history_cap {
                if let Some(pos) = alerts.iter().position(|a| a.status == AlertStatus::Resolved) {
                    alerts.remove(pos);
                } else {
                    alerts.remove(0);
                }
            }
        }

        info!(alert_id = %id, rule_id = %alert.rule_id, "alert created");
        self.bus.publish(MonitorEvent::AlertCreated { alert });
        Some(id)
    }

    fn notify(&self, alert: &Alert) {
        let actions = self
            .rules
            .lock()
            .expect("rules lock poisoned")
            .get(&alert.rule_id)
            .map(|r| r.actions.clone())
            .unwrap_or_default();

        if actions.is_empty() {
            // Alerts admitted from outside the registry still hit the console.
            if let Some(channel) = self.channels.get("console") {
                channel.notify(alert, &serde_json::Value::Null);
            }
            return;
        }
        for action in &actions {
            match self.channels.get(&action.channel) {
                Some(channel) => channel.notify(alert, &action.config),
                None => warn!(channel = %action.channel, "unknown notification channel"),
            }
        }
    }

    /// Acknowledge an active alert. Monotone: returns `false` when the alert
    /// is unknown, already acknowledged, or already resolved.
    pub fn acknowledge_alert(&self, id: Uuid, user: &str) -> bool {
        let mut alerts = self.alerts.write().expect("alerts lock poisoned");
        let Some(alert) = alerts.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        if alert.status != AlertStatus::Active {
            return false;
        }
        alert.status = AlertStatus::Acknowledged;
        alert.acknowledged_by = Some(user.to_string());
        alert.acknowledged_at = Some(Utc::now());
        info!(alert_id = %id, user, "alert acknowledged");
        true
    }

    /// Resolve an active or acknowledged alert. Returns `false` when the
    /// alert is unknown or already resolved.
    pub fn resolve_alert(&self, id: Uuid, user: &str, resolution: &str) -> bool {
        let mut alerts = self.alerts.write().expect("alerts lock poisoned");
        let Some(alert) = alerts.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        if alert.status == AlertStatus::Resolved {
            return false;
        }
        alert.status = AlertStatus::Resolved;
        alert.resolved_at = Some(Utc::now());
        alert.resolution = Some(resolution.to_string());
        if alert.acknowledged_by.is_none() {
            alert.acknowledged_by = Some(user.to_string());
        }
        info!(alert_id = %id, user, "alert resolved");
        true
    }

    /// Install a temporary filter blocking creation of alerts whose title
    /// contains `pattern`.
    pub fn suppress_alerts(&self, pattern: impl Into<String>, duration: Duration) {
        let pattern = pattern.into();
        info!(pattern = %pattern, ?duration, "alert suppression installed");
        self.suppressions
            .lock()
            .expect("suppressions lock poisoned")
            .push(Suppression {
                pattern,
                until: Instant::now() + duration,
            });
    }

    fn is_suppressed(&self, title: &str) -> bool {
        let now = Instant::now();
        let mut suppressions = self.suppressions.lock().expect("suppressions lock poisoned");
        suppressions.retain(|s| s.until > now);
        suppressions.iter().any(|s| title.contains(&s.pattern))
    }

    // -- Queries -----------------------------------------------------------------

    /// Unresolved alerts (active + acknowledged), newest first.
    pub fn get_active_alerts(&self, filter: Option<&AlertFilter>) -> Vec<Alert> {
        let alerts = self.alerts.read().expect("alerts lock poisoned");
        let mut out: Vec<Alert> = alerts
            .iter()
            .filter(|a| a.status != AlertStatus::Resolved)
            .filter(|a| match filter {
                Some(f) => {
                    f.severity.is_none_or(|s| a.severity == s)
                        && f.category.as_ref().is_none_or(|c| &a.category == c)
                }
                None => true,
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Counts by severity/category, trend direction, and mean time to
    /// acknowledge/resolve over the trailing window.
    pub fn get_alert_analytics(&self, window_hours: i64) -> AlertAnalytics {
        let now = Utc::now();
        let cutoff = now - ChronoDuration::hours(window_hours);
        let midpoint = now - ChronoDuration::hours(window_hours) / 2;
        let alerts = self.alerts.read().expect("alerts lock poisoned");

        let mut by_severity: HashMap<AlertSeverity, usize> = HashMap::new();
        let mut by_category: HashMap<String, usize> = HashMap::new();
        let mut ack_times = Vec::new();
        let mut resolve_times = Vec::new();
        let mut older_half = 0usize;
        let mut newer_half = 0usize;
        let mut total = 0usize;

        for alert in alerts.iter().filter(|a| a.created_at >= cutoff) {
            total += 1;
            *by_severity.entry(alert.severity).or_default() += 1;
            *by_category.entry(alert.category.clone()).or_default() += 1;
            if alert.created_at >= midpoint {
                newer_half += 1;
            } else {
                older_half += 1;
            }
            if let Some(at) = alert.acknowledged_at {
                ack_times.push((at - alert.created_at).num_milliseconds().max(0) as f64);
            }
            if let Some(at) = alert.resolved_at {
                resolve_times.push((at - alert.created_at).num_milliseconds().max(0) as f64);
            }
        }

        let mean = |values: &[f64]| {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };
        let trend = if newer_half > older_half {
            TrendDirection::Increasing
        } else if newer_half < older_half {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };

        AlertAnalytics {
            window_hours,
            total,
            by_severity,
            by_category,
            trend,
            mean_time_to_acknowledge_ms: mean(&ack_times),
            mean_time_to_resolve_ms: mean(&resolve_times),
        }
    }
}
