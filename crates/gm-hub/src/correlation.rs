use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::debug;

use gm_core::types::{CorrelatedEvent, CrossSystemEvent};

struct PendingGroup {
    events: Vec<CrossSystemEvent>,
    first_seen: Instant,
    emitted: bool,
}

/// Groups cross-system events sharing a correlation id.
///
/// A correlated event is emitted exactly once per id, at the moment a second
/// distinct source joins the group. Groups older than the window are evicted
/// whether or not they ever correlated.
pub struct CorrelationTracker {
    window: Duration,
    pending: HashMap<String, PendingGroup>,
}

impl CorrelationTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Add an event to its correlation group.
    ///
    /// Events without a correlation id are ignored. Returns the correlated
    /// event when this observation completes a group for the first time.
    pub fn observe(&mut self, event: CrossSystemEvent, now: Instant) -> Option<CorrelatedEvent> {
        self.evict(now);
        let correlation_id = event.correlation_id.clone()?;

        let group = self
            .pending
            .entry(correlation_id.clone())
            .or_insert_with(|| PendingGroup {
                events: Vec::new(),
                first_seen: now,
                emitted: false,
            });
        group.events.push(event);

        if group.emitted {
            return None;
        }
        let mut sources: Vec<String> = group.events.iter().map(|e| e.source.clone()).collect();
        sources.sort();
        sources.dedup();
        if sources.len() < 2 {
            return None;
        }

        group.emitted = true;
        debug!(%correlation_id, sources = sources.len(), "events correlated");
        Some(CorrelatedEvent {
            correlation_id,
            sources,
            events: group.events.clone(),
            timestamp: Utc::now(),
        })
    }

    fn evict(&mut self, now: Instant) {
        let window = self.window;
        self.pending
            .retain(|_, group| now.duration_since(group.first_seen) < window);
    }

    /// Number of correlation groups currently waiting for siblings.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
