//! Task/agent lifecycle tracking: the single source of truth the sampler
//! and integration hub pull from.

pub mod tracker;

pub use tracker::{LifecycleTracker, PerformanceSummary, TrackerError};
