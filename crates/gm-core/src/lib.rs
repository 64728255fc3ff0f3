//! Shared domain types, configuration, and runtime plumbing for the
//! gemini-monitor observability stack.

pub mod config;
pub mod logging;
pub mod shutdown;
pub mod types;

pub use config::MonitorConfig;
pub use shutdown::ShutdownSignal;
