use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use gm_bus::{EventKind, MonitorEvent};
use gm_core::types::{Alert, AlertSeverity, AlertStatus, MonitoringSnapshot};

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// Errors surfaced by a rule condition.
///
/// A condition that fails is logged and treated as non-matching; it never
/// aborts evaluation of the remaining rules.
#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    #[error("condition evaluation failed: {0}")]
    Evaluation(String),
}

/// Read-only view a condition evaluates against: the latest snapshot (when
/// one has been collected) plus the event that triggered re-evaluation.
#[derive(Debug, Clone)]
pub struct AlertContext {
    pub snapshot: Option<MonitoringSnapshot>,
    pub event: MonitorEvent,
}

/// A pure predicate over an [`AlertContext`].
///
/// Implemented by concrete rule types or directly by closures via the
/// blanket impl below.
pub trait Condition: Send + Sync {
    fn evaluate(&self, ctx: &AlertContext) -> Result<bool, ConditionError>;
}

impl<F> Condition for F
where
    F: Fn(&AlertContext) -> Result<bool, ConditionError> + Send + Sync,
{
    fn evaluate(&self, ctx: &AlertContext) -> Result<bool, ConditionError> {
        self(ctx)
    }
}

// ---------------------------------------------------------------------------
// AlertRule
// ---------------------------------------------------------------------------

/// Notification action attached to a rule: channel name plus channel-specific
/// configuration.
#[derive(Debug, Clone)]
pub struct AlertAction {
    pub channel: String,
    pub config: serde_json::Value,
}

#[derive(Clone)]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub severity: AlertSeverity,
    pub condition: Arc<dyn Condition>,
    /// Event kinds that cause this rule to be re-evaluated.
    pub triggers: Vec<EventKind>,
    pub cooldown: Duration,
    pub enabled: bool,
    pub actions: Vec<AlertAction>,
}

impl std::fmt::Debug for AlertRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertRule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("category", &self.category)
            .field("severity", &self.severity)
            .field("triggers", &self.triggers)
            .field("cooldown", &self.cooldown)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl AlertRule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        severity: AlertSeverity,
        triggers: Vec<EventKind>,
        cooldown: Duration,
        condition: Arc<dyn Condition>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: "general".to_string(),
            severity,
            condition,
            triggers,
            cooldown,
            enabled: true,
            actions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_action(mut self, channel: impl Into<String>, config: serde_json::Value) -> Self {
        self.actions.push(AlertAction {
            channel: channel.into(),
            config,
        });
        self
    }

    /// Build the alert this rule raises for the given context.
    pub fn raise(&self, ctx: &AlertContext) -> Alert {
        Alert {
            id: Uuid::new_v4(),
            rule_id: self.id.clone(),
            category: self.category.clone(),
            severity: self.severity,
            title: self.name.clone(),
            description: self.description.clone(),
            source: ctx.event.source().to_string(),
            context: serde_json::to_value(&ctx.event).ok(),
            status: AlertStatus::Active,
            created_at: Utc::now(),
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_at: None,
            resolution: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// Rule storage plus per-rule cooldown tracking.
///
/// Shared by the alert system and the real-time sampler so both honour the
/// same cooldown contract: a rule cannot fire again until `cooldown` has
/// elapsed since its last firing, tracked per rule id, never globally.
#[derive(Default)]
pub struct RuleSet {
    rules: HashMap<String, AlertRule>,
    last_fired: HashMap<String, Instant>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a rule. Returns `true` when a rule was replaced.
    pub fn upsert(&mut self, rule: AlertRule) -> bool {
        self.rules.insert(rule.id.clone(), rule).is_some()
    }

    /// Remove a rule and its cooldown state. Returns `false` for unknown ids.
    pub fn remove(&mut self, id: &str) -> bool {
        self.last_fired.remove(id);
        self.rules.remove(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&AlertRule> {
        self.rules.get(id)
    }

    pub fn rules(&self) -> Vec<AlertRule> {
        self.rules.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate every enabled rule whose trigger set includes the context's
    /// event kind. Returns the alerts raised by matching rules that are
    /// outside their cooldown window.
    pub fn evaluate(&mut self, ctx: &AlertContext, now: Instant) -> Vec<Alert> {
        let kind = ctx.event.kind();
        let mut raised = Vec::new();

        for rule in self.rules.values() {
            if !rule.enabled || !rule.triggers.contains(&kind) {
                continue;
            }

            let matched = match rule.condition.evaluate(ctx) {
                Ok(matched) => matched,
                Err(e) => {
                    // One faulty rule must not take down the rest.
                    warn!(rule_id = %rule.id, error = %e, "rule condition failed; treated as non-matching");
                    false
                }
            };
            if !matched {
                continue;
            }

            if let Some(last) = self.last_fired.get(&rule.id) {
                if now.duration_since(*last) < rule.cooldown {
                    debug!(rule_id = %rule.id, "rule match suppressed by cooldown");
                    continue;
                }
            }

            raised.push((rule.id.clone(), rule.raise(ctx)));
        }

        let mut alerts = Vec::with_capacity(raised.len());
        for (rule_id, alert) in raised {
            self.last_fired.insert(rule_id, now);
            alerts.push(alert);
        }
        alerts
    }
}
