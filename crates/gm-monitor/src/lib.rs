//! Real-time sampling: periodic snapshots, health classification, built-in
//! alert rules, predictive insights, and history export.

pub mod export;
pub mod insights;
pub mod probe;
pub mod sampler;

pub use export::ExportError;
pub use probe::{ProcProbe, ResourceProbe, ResourceSample, StaticProbe};
pub use sampler::RealtimeMonitor;
