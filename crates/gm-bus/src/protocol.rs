use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gm_core::types::{
    Agent, AgentStatus, Alert, CorrelatedEvent, CrossSystemEvent, MetricSample,
    MonitoringSnapshot, PredictiveInsight, Task, TaskStatus,
};

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// Discriminant of a [`MonitorEvent`], used as the trigger key in alert
/// rule definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskRegistered,
    TaskStatusChanged,
    TaskCompleted,
    TaskFailed,
    AgentRegistered,
    AgentHeartbeat,
    AgentStatusChanged,
    MetricRecorded,
    AlertCreated,
    SnapshotCollected,
    InsightGenerated,
    CrossSystem,
    EventsCorrelated,
    SyncCompleted,
}

impl EventKind {
    /// Wire label matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TaskRegistered => "task_registered",
            EventKind::TaskStatusChanged => "task_status_changed",
            EventKind::TaskCompleted => "task_completed",
            EventKind::TaskFailed => "task_failed",
            EventKind::AgentRegistered => "agent_registered",
            EventKind::AgentHeartbeat => "agent_heartbeat",
            EventKind::AgentStatusChanged => "agent_status_changed",
            EventKind::MetricRecorded => "metric_recorded",
            EventKind::AlertCreated => "alert_created",
            EventKind::SnapshotCollected => "snapshot_collected",
            EventKind::InsightGenerated => "insight_generated",
            EventKind::CrossSystem => "cross_system",
            EventKind::EventsCorrelated => "events_correlated",
            EventKind::SyncCompleted => "sync_completed",
        }
    }
}

// ---------------------------------------------------------------------------
// MonitorEvent
// ---------------------------------------------------------------------------

/// Every message published on the monitoring event bus.
///
/// Delivery is synchronous and in-order per subscriber; payloads are owned
/// clones so subscribers never hold references into component state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    TaskRegistered {
        task: Task,
    },
    TaskStatusChanged {
        task: Task,
        previous: TaskStatus,
        correlation_id: Option<String>,
    },
    TaskCompleted {
        task: Task,
        correlation_id: Option<String>,
    },
    TaskFailed {
        task: Task,
        error: Option<String>,
        correlation_id: Option<String>,
    },
    AgentRegistered {
        agent: Agent,
    },
    AgentHeartbeat {
        agent: Agent,
    },
    AgentStatusChanged {
        agent: Agent,
        previous: AgentStatus,
    },
    MetricRecorded {
        sample: MetricSample,
    },
    AlertCreated {
        alert: Alert,
    },
    SnapshotCollected {
        snapshot: Box<MonitoringSnapshot>,
    },
    InsightGenerated {
        insight: PredictiveInsight,
    },
    CrossSystem {
        envelope: CrossSystemEvent,
    },
    EventsCorrelated {
        correlated: CorrelatedEvent,
    },
    SyncCompleted {
        timestamp: DateTime<Utc>,
    },
}

impl MonitorEvent {
    /// The trigger discriminant for alert rule matching.
    pub fn kind(&self) -> EventKind {
        match self {
            MonitorEvent::TaskRegistered { .. } => EventKind::TaskRegistered,
            MonitorEvent::TaskStatusChanged { .. } => EventKind::TaskStatusChanged,
            MonitorEvent::TaskCompleted { .. } => EventKind::TaskCompleted,
            MonitorEvent::TaskFailed { .. } => EventKind::TaskFailed,
            MonitorEvent::AgentRegistered { .. } => EventKind::AgentRegistered,
            MonitorEvent::AgentHeartbeat { .. } => EventKind::AgentHeartbeat,
            MonitorEvent::AgentStatusChanged { .. } => EventKind::AgentStatusChanged,
            MonitorEvent::MetricRecorded { .. } => EventKind::MetricRecorded,
            MonitorEvent::AlertCreated { .. } => EventKind::AlertCreated,
            MonitorEvent::SnapshotCollected { .. } => EventKind::SnapshotCollected,
            MonitorEvent::InsightGenerated { .. } => EventKind::InsightGenerated,
            MonitorEvent::CrossSystem { .. } => EventKind::CrossSystem,
            MonitorEvent::EventsCorrelated { .. } => EventKind::EventsCorrelated,
            MonitorEvent::SyncCompleted { .. } => EventKind::SyncCompleted,
        }
    }

    /// Name of the component that originates this event type.
    pub fn source(&self) -> &'static str {
        match self {
            MonitorEvent::TaskRegistered { .. }
            | MonitorEvent::TaskStatusChanged { .. }
            | MonitorEvent::TaskCompleted { .. }
            | MonitorEvent::TaskFailed { .. }
            | MonitorEvent::AgentRegistered { .. }
            | MonitorEvent::AgentHeartbeat { .. }
            | MonitorEvent::AgentStatusChanged { .. } => "tracker",
            MonitorEvent::MetricRecorded { .. } => "analytics",
            MonitorEvent::AlertCreated { .. } => "alerts",
            MonitorEvent::SnapshotCollected { .. } | MonitorEvent::InsightGenerated { .. } => {
                "monitor"
            }
            MonitorEvent::CrossSystem { .. }
            | MonitorEvent::EventsCorrelated { .. }
            | MonitorEvent::SyncCompleted { .. } => "hub",
        }
    }

    /// Caller-supplied correlation id, when the event carries one.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            MonitorEvent::TaskStatusChanged { correlation_id, .. }
            | MonitorEvent::TaskCompleted { correlation_id, .. }
            | MonitorEvent::TaskFailed { correlation_id, .. } => correlation_id.as_deref(),
            MonitorEvent::MetricRecorded { sample } => sample
                .tags
                .iter()
                .find(|(k, _)| k == "correlation_id")
                .map(|(_, v)| v.as_str()),
            MonitorEvent::CrossSystem { envelope } => envelope.correlation_id.as_deref(),
            _ => None,
        }
    }
}
