//! Performance measurement
//!
//! Response-time statistics and per-endpoint thresholds.

#![allow(dead_code)]

mod metrics;
mod thresholds;

pub use metrics::{
    median, outliers, percentile, ErrorStats, LatencyStats, Metrics, MetricsCollector,
    Percentiles,
};
pub use thresholds::{LatencyGrade, LatencyThreshold, PerformanceThreshold};
