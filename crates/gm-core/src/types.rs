use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Assigned,
    InProgress,
    Blocked,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Returns `true` when a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &TaskStatus) -> bool {
        matches!(
            (self, target),
            (TaskStatus::Queued, TaskStatus::Assigned)
                | (TaskStatus::Queued, TaskStatus::InProgress)
                | (TaskStatus::Queued, TaskStatus::Cancelled)
                | (TaskStatus::Assigned, TaskStatus::InProgress)
                | (TaskStatus::Assigned, TaskStatus::Cancelled)
                | (TaskStatus::InProgress, TaskStatus::Blocked)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed)
                | (TaskStatus::InProgress, TaskStatus::Cancelled)
                | (TaskStatus::Blocked, TaskStatus::InProgress)
                | (TaskStatus::Blocked, TaskStatus::Cancelled)
                | (TaskStatus::Blocked, TaskStatus::Failed)
        )
    }

    /// Terminal statuses carry an `end_time` and never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

// ---------------------------------------------------------------------------
// TaskType / TaskPriority
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Implementation,
    Testing,
    Documentation,
    Validation,
    Deployment,
    Analysis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

// ---------------------------------------------------------------------------
// TaskSpec / Task
// ---------------------------------------------------------------------------

/// Caller-supplied specification for a new task. Validated at registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    #[serde(default)]
    pub estimated_duration_ms: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl TaskSpec {
    pub fn new(title: impl Into<String>, task_type: TaskType, priority: TaskPriority) -> Self {
        Self {
            title: title.into(),
            description: None,
            task_type,
            priority,
            dependencies: Vec::new(),
            estimated_duration_ms: None,
            tags: Vec::new(),
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub assigned_agent: Option<Uuid>,
    pub dependencies: Vec<Uuid>,
    /// Completion percentage, 0..=100.
    pub progress: u8,
    pub estimated_duration_ms: Option<u64>,
    pub actual_duration_ms: Option<u64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub error_count: u32,
    pub retry_count: u32,
    pub tags: Vec<String>,
    pub metadata: Option<serde_json::Value>,
}

impl Task {
    pub fn from_spec(spec: TaskSpec) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: spec.title,
            description: spec.description,
            task_type: spec.task_type,
            priority: spec.priority,
            status: TaskStatus::Queued,
            assigned_agent: None,
            dependencies: spec.dependencies,
            progress: 0,
            estimated_duration_ms: spec.estimated_duration_ms,
            actual_duration_ms: None,
            start_time: None,
            end_time: None,
            created_at: now,
            last_update: now,
            error_count: 0,
            retry_count: 0,
            tags: spec.tags,
            metadata: spec.metadata,
        }
    }
}

/// Patch applied alongside a status transition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub assigned_agent: Option<Uuid>,
}

/// One entry in a task's status history, newest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Idle,
    Busy,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPerformance {
    /// completed / (completed + failed) * 100; 100 when the denominator is 0.
    pub success_rate: f64,
    pub average_completion_time_ms: f64,
    /// Completed tasks per hour of tracked lifetime.
    pub task_throughput: f64,
}

impl Default for AgentPerformance {
    fn default() -> Self {
        Self {
            success_rate: 100.0,
            average_completion_time_ms: 0.0,
            task_throughput: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub status: AgentStatus,
    pub capabilities: Vec<String>,
    pub current_tasks: Vec<Uuid>,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub average_task_duration_ms: f64,
    pub last_heartbeat: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
    pub performance: AgentPerformance,
}

impl Agent {
    pub fn new(name: impl Into<String>, capabilities: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: AgentStatus::Idle,
            capabilities,
            current_tasks: Vec::new(),
            completed_tasks: 0,
            failed_tasks: 0,
            average_task_duration_ms: 0.0,
            last_heartbeat: now,
            registered_at: now,
            performance: AgentPerformance::default(),
        }
    }

    /// Recompute the derived performance block after a completion or failure.
    pub fn recompute_performance(&mut self) {
        let finished = self.completed_tasks + self.failed_tasks;
        self.performance.success_rate = if finished == 0 {
            100.0
        } else {
            self.completed_tasks as f64 / finished as f64 * 100.0
        };
        self.performance.average_completion_time_ms = self.average_task_duration_ms;
        let lifetime_hours = (Utc::now() - self.registered_at).num_seconds() as f64 / 3600.0;
        self.performance.task_throughput = if lifetime_hours > 0.0 {
            self.completed_tasks as f64 / lifetime_hours
        } else {
            self.completed_tasks as f64
        };
    }
}

// ---------------------------------------------------------------------------
// Health / snapshot metric blocks
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    #[default]
    Healthy = 0,
    Degraded = 1,
    Unhealthy = 2,
    Critical = 3,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SystemHealth {
    pub overall: HealthLevel,
    pub uptime_secs: u64,
    pub memory_usage_mb: f64,
    pub cpu_usage_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub total: usize,
    pub queued: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub blocked: usize,
    pub cancelled: usize,
    pub success_rate: f64,
    pub average_execution_time_ms: f64,
    pub throughput_per_hour: f64,
}

impl Default for TaskMetrics {
    fn default() -> Self {
        Self {
            total: 0,
            queued: 0,
            in_progress: 0,
            completed: 0,
            failed: 0,
            blocked: 0,
            cancelled: 0,
            success_rate: 100.0,
            average_execution_time_ms: 0.0,
            throughput_per_hour: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentMetrics {
    pub total: usize,
    pub active: usize,
    pub idle: usize,
    pub busy: usize,
    pub offline: usize,
    pub average_utilization: f64,
    pub average_performance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PerformanceMetrics {
    pub response_time_ms: f64,
    pub throughput: f64,
    pub error_rate: f64,
    pub availability_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityTrend {
    Improving,
    Degrading,
    #[default]
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SnapshotTrends {
    pub task_load: TrendDirection,
    pub error_rate: TrendDirection,
    pub throughput: TrendDirection,
    pub health: QualityTrend,
}

/// Immutable point-in-time summary produced once per sampling tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSnapshot {
    pub timestamp: DateTime<Utc>,
    pub system_health: SystemHealth,
    pub task_metrics: TaskMetrics,
    pub agent_metrics: AgentMetrics,
    pub performance_metrics: PerformanceMetrics,
    pub trends: SnapshotTrends,
    pub active_alerts: Vec<Alert>,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub rule_id: String,
    pub category: String,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
    pub source: String,
    pub context: Option<serde_json::Value>,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
}

// ---------------------------------------------------------------------------
// Predictive insights
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    CapacityPrediction,
    FailurePrediction,
    BottleneckPrediction,
    TrendAnalysis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictiveInsight {
    pub id: Uuid,
    pub insight_type: InsightType,
    pub title: String,
    pub description: String,
    /// Model confidence in [0, 1].
    pub confidence: f64,
    pub time_horizon: String,
    pub recommendation: String,
    pub impact: ImpactLevel,
    pub data_points: usize,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Metrics and cross-system events
// ---------------------------------------------------------------------------

/// One named metric observation submitted by an instrumented collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub category: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<(String, String)>,
}

/// Normalized envelope the hub republishes for every inbound domain event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossSystemEvent {
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<String>,
    pub data: serde_json::Value,
}

/// Events from >1 distinct sources sharing one correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedEvent {
    pub correlation_id: String,
    pub sources: Vec<String>,
    pub events: Vec<CrossSystemEvent>,
    pub timestamp: DateTime<Utc>,
}
