//! 성과 분석.

mod metrics;

pub use metrics::{compute_metrics, decimal_sqrt, PerformanceAnalytics};
