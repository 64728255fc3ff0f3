//! Typed publish/subscribe plumbing shared by all monitoring components.

pub mod event_bus;
pub mod protocol;

pub use event_bus::EventBus;
pub use protocol::{EventKind, MonitorEvent};
