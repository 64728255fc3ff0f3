//! Rule-based alerting: rule registry, condition evaluation with per-rule
//! cooldown, alert lifecycle, suppression, and notification channels.

pub mod rules;
pub mod system;

pub use rules::{AlertAction, AlertContext, AlertRule, Condition, ConditionError, RuleSet};
pub use system::{
    AlertAnalytics, AlertFilter, AlertSystem, ConsoleChannel, NotificationChannel,
};
