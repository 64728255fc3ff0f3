use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use gm_bus::{EventBus, MonitorEvent};
use gm_core::config::TrackerConfig;
use gm_core::types::{
    Agent, AgentMetrics, AgentStatus, StatusChange, Task, TaskMetrics, TaskSpec, TaskStatus,
    TaskUpdate,
};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors rejected at the task registration boundary.
///
/// Registration validates the spec before any state is mutated; a rejected
/// spec leaves the tracker untouched.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// The spec is missing a required field or carries an invalid value.
    #[error("invalid task spec: {0}")]
    InvalidSpec(String),

    /// A declared dependency does not resolve to a registered task.
    #[error("unknown dependency: {0}")]
    UnknownDependency(Uuid),
}

// ---------------------------------------------------------------------------
// PerformanceSummary
// ---------------------------------------------------------------------------

/// Task and agent roll-ups sampled by the real-time monitor.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PerformanceSummary {
    pub tasks: TaskMetrics,
    pub agents: AgentMetrics,
}

// ---------------------------------------------------------------------------
// LifecycleTracker
// ---------------------------------------------------------------------------

/// Canonical owner of every task and agent record.
///
/// All mutation goes through the defined transition operations; other
/// components only ever observe cloned values. Tasks are never deleted --
/// terminal tasks remain queryable until the process ends.
pub struct LifecycleTracker {
    tasks: RwLock<HashMap<Uuid, Task>>,
    agents: RwLock<HashMap<Uuid, Agent>>,
    history: RwLock<HashMap<Uuid, VecDeque<StatusChange>>>,
    history_cap: usize,
    bus: EventBus,
    started_at: DateTime<Utc>,
}

impl LifecycleTracker {
    pub fn new(config: TrackerConfig, bus: EventBus) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            agents: RwLock::new(HashMap::new()),
            history: RwLock::new(HashMap::new()),
            history_cap: config.status_history_cap.max(1),
            bus,
            started_at: Utc::now(),
        }
    }

    // -- Tasks ---------------------------------------------------------------

    /// Register a new task. Validates the spec, assigns an id, sets
    /// status=queued and progress=0, and publishes a registration event.
    pub fn register_task(&self, spec: TaskSpec) -> Result<Uuid, TrackerError> {
        if spec.title.trim().is_empty() {
            return Err(TrackerError::InvalidSpec("title must not be empty".into()));
        }
        if let Some(p) = spec.estimated_duration_ms {
            if p == 0 {
                return Err(TrackerError::InvalidSpec(
                    "estimated_duration_ms must be positive when set".into(),
                ));
            }
        }

        let mut tasks = self.tasks.write().expect("tasks lock poisoned");
        for dep in &spec.dependencies {
            if !tasks.contains_key(dep) {
                return Err(TrackerError::UnknownDependency(*dep));
            }
        }

        let task = Task::from_spec(spec);
        let id = task.id;
        tasks.insert(id, task.clone());
        drop(tasks);

        info!(task_id = %id, title = %task.title, "task registered");
        self.bus.publish(MonitorEvent::TaskRegistered { task });
        Ok(id)
    }

    /// Apply a status transition plus patch to a task.
    ///
    /// Returns `false` (without mutating anything) when the id is unknown or
    /// the transition is invalid for the task's current status. On success
    /// publishes a status-changed event and, for completed/failed, the
    /// matching terminal event.
    pub fn update_task_status(&self, id: Uuid, new_status: TaskStatus, update: TaskUpdate) -> bool {
        let (task, previous) = {
            let mut tasks = self.tasks.write().expect("tasks lock poisoned");
            let Some(task) = tasks.get_mut(&id) else {
                debug!(task_id = %id, "status update for unknown task ignored");
                return false;
            };

            let previous = task.status;
            if !previous.can_transition_to(&new_status) {
                warn!(
                    task_id = %id,
                    from = ?previous,
                    to = ?new_status,
                    "invalid task transition rejected"
                );
                return false;
            }

            let now = Utc::now();
            task.status = new_status;
            task.last_update = now;

            if let Some(progress) = update.progress {
                task.progress = progress.min(100);
            }
            if update.error.is_some() {
                task.error_count += 1;
            }
            if let Some(agent_id) = update.assigned_agent {
                task.assigned_agent = Some(agent_id);
            }

            match new_status {
                TaskStatus::InProgress => {
                    if task.start_time.is_none() {
                        task.start_time = Some(now);
                    }
                }
                TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
                    task.end_time = Some(now);
                    if let Some(start) = task.start_time {
                        task.actual_duration_ms =
                            Some((now - start).num_milliseconds().max(0) as u64);
                    }
                    if new_status == TaskStatus::Completed {
                        task.progress = 100;
                    }
                    if new_status == TaskStatus::Failed && update.error.is_none() {
                        task.error_count += 1;
                    }
                }
                _ => {}
            }

            (task.clone(), previous)
        };

        self.push_history(
            id,
            StatusChange {
                from: previous,
                to: new_status,
                at: task.last_update,
                note: update.notes.clone(),
            },
        );

        if new_status.is_terminal() {
            self.settle_agent(&task, new_status);
        } else if new_status == TaskStatus::Assigned {
            self.attach_agent(&task);
        }

        debug!(task_id = %id, from = ?previous, to = ?new_status, "task status changed");
        self.bus.publish(MonitorEvent::TaskStatusChanged {
            task: task.clone(),
            previous,
            correlation_id: update.correlation_id.clone(),
        });
        match new_status {
            TaskStatus::Completed => self.bus.publish(MonitorEvent::TaskCompleted {
                task,
                correlation_id: update.correlation_id,
            }),
            TaskStatus::Failed => self.bus.publish(MonitorEvent::TaskFailed {
                task,
                error: update.error,
                correlation_id: update.correlation_id,
            }),
            _ => {}
        }

        true
    }

    fn push_history(&self, id: Uuid, change: StatusChange) {
        let mut history = self.history.write().expect("history lock poisoned");
        let entries = history.entry(id).or_default();
        entries.push_front(change);
        entries.truncate(self.history_cap);
    }

    /// Record a terminal task against its assigned agent's counters.
    fn settle_agent(&self, task: &Task, status: TaskStatus) {
        let Some(agent_id) = task.assigned_agent else {
            return;
        };
        let mut agents = self.agents.write().expect("agents lock poisoned");
        let Some(agent) = agents.get_mut(&agent_id) else {
            return;
        };

        agent.current_tasks.retain(|t| *t != task.id);
        match status {
            TaskStatus::Completed => {
                agent.completed_tasks += 1;
                if let Some(duration) = task.actual_duration_ms {
                    // Running mean over completed tasks.
                    let n = agent.completed_tasks as f64;
                    agent.average_task_duration_ms =
                        agent.average_task_duration_ms + (duration as f64 - agent.average_task_duration_ms) / n;
                }
            }
            TaskStatus::Failed => {
                agent.failed_tasks += 1;
            }
            _ => {}
        }
        if agent.current_tasks.is_empty() && agent.status == AgentStatus::Busy {
            agent.status = AgentStatus::Idle;
        }
        agent.recompute_performance();
    }

    fn attach_agent(&self, task: &Task) {
        let Some(agent_id) = task.assigned_agent else {
            return;
        };
        let mut agents = self.agents.write().expect("agents lock poisoned");
        if let Some(agent) = agents.get_mut(&agent_id) {
            if !agent.current_tasks.contains(&task.id) {
                agent.current_tasks.push(task.id);
            }
            agent.status = AgentStatus::Busy;
        }
    }

    pub fn get_task(&self, id: Uuid) -> Option<Task> {
        self.tasks.read().expect("tasks lock poisoned").get(&id).cloned()
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.tasks
            .read()
            .expect("tasks lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Status history for a task, newest-first. Empty for unknown ids.
    pub fn task_history(&self, id: Uuid) -> Vec<StatusChange> {
        self.history
            .read()
            .expect("history lock poisoned")
            .get(&id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    // -- Agents ----------------------------------------------------------------

    /// Register a worker agent and publish a registration event.
    pub fn register_agent(&self, name: impl Into<String>, capabilities: Vec<String>) -> Uuid {
        let agent = Agent::new(name, capabilities);
        let id = agent.id;
        self.agents
            .write()
            .expect("agents lock poisoned")
            .insert(id, agent.clone());
        info!(agent_id = %id, name = %agent.name, "agent registered");
        self.bus.publish(MonitorEvent::AgentRegistered { agent });
        id
    }

    /// Record a heartbeat (and optional status change) for an agent.
    ///
    /// Heartbeats on unknown agents are a no-op returning `false`.
    pub fn update_agent_heartbeat(&self, id: Uuid, status: Option<AgentStatus>) -> bool {
        let (agent, previous) = {
            let mut agents = self.agents.write().expect("agents lock poisoned");
            let Some(agent) = agents.get_mut(&id) else {
                debug!(agent_id = %id, "heartbeat for unknown agent ignored");
                return false;
            };
            let previous = agent.status;
            agent.last_heartbeat = Utc::now();
            if let Some(status) = status {
                agent.status = status;
            }
            (agent.clone(), previous)
        };

        if agent.status != previous {
            self.bus.publish(MonitorEvent::AgentStatusChanged {
                agent: agent.clone(),
                previous,
            });
        }
        self.bus.publish(MonitorEvent::AgentHeartbeat { agent });
        true
    }

    pub fn get_agent(&self, id: Uuid) -> Option<Agent> {
        self.agents.read().expect("agents lock poisoned").get(&id).cloned()
    }

    pub fn list_agents(&self) -> Vec<Agent> {
        self.agents
            .read()
            .expect("agents lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    // -- Roll-ups ----------------------------------------------------------------

    /// Seconds since this tracker instance was constructed.
    pub fn uptime_secs(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }

    /// Aggregate task/agent state into the metric blocks used by snapshots.
    pub fn get_performance_metrics(&self) -> PerformanceSummary {
        let tasks = self.tasks.read().expect("tasks lock poisoned");
        let agents = self.agents.read().expect("agents lock poisoned");
        let now = Utc::now();

        let mut m = TaskMetrics {
            total: tasks.len(),
            ..TaskMetrics::default()
        };
        let mut duration_sum = 0.0;
        let mut completed_last_hour = 0usize;
        for task in tasks.values() {
            match task.status {
                TaskStatus::Queued | TaskStatus::Assigned => m.queued += 1,
                TaskStatus::InProgress => m.in_progress += 1,
                TaskStatus::Blocked => m.blocked += 1,
                TaskStatus::Completed => m.completed += 1,
                TaskStatus::Failed => m.failed += 1,
                TaskStatus::Cancelled => m.cancelled += 1,
            }
            if task.status == TaskStatus::Completed {
                if let Some(d) = task.actual_duration_ms {
                    duration_sum += d as f64;
                }
                if let Some(end) = task.end_time {
                    if (now - end).num_seconds() <= 3600 {
                        completed_last_hour += 1;
                    }
                }
            }
        }
        let finished = m.completed + m.failed;
        m.success_rate = if finished == 0 {
            100.0
        } else {
            m.completed as f64 / finished as f64 * 100.0
        };
        m.average_execution_time_ms = if m.completed == 0 {
            0.0
        } else {
            duration_sum / m.completed as f64
        };
        m.throughput_per_hour = completed_last_hour as f64;

        let mut a = AgentMetrics {
            total: agents.len(),
            ..AgentMetrics::default()
        };
        let mut performance_sum = 0.0;
        for agent in agents.values() {
            match agent.status {
                AgentStatus::Active => a.active += 1,
                AgentStatus::Idle => a.idle += 1,
                AgentStatus::Busy => a.busy += 1,
                AgentStatus::Offline => a.offline += 1,
            }
            performance_sum += agent.performance.success_rate;
        }
        if a.total > 0 {
            a.average_utilization = a.busy as f64 / a.total as f64 * 100.0;
            a.average_performance = performance_sum / a.total as f64;
        }

        PerformanceSummary {
            tasks: m,
            agents: a,
        }
    }
}
