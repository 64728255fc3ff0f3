//! Metrics ingestion, trend classification, and optimization insights.

pub mod engine;
pub mod trend;

pub use engine::{
    AnalyticsEngine, AnalyticsReport, BenchmarkStatus, BenchmarkTarget, DashboardData,
    Recommendation, TimeRange,
};
pub use trend::{linear_trend, TrendSummary};
