//! Integration hub: routes every domain event through analytics and alert
//! evaluation, correlates events across components, and serves the
//! aggregated view in multiple export formats.

pub mod correlation;
pub mod export;
pub mod hub;

pub use correlation::CorrelationTracker;
pub use export::ExportError;
pub use hub::{AggregatedData, ComponentHealth, DashboardSink, IntegrationHub, SystemStatus};
