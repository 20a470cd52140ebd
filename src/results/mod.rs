//! Session results
//!
//! The shared endpoint aggregator and the discovery report file.

mod aggregator;
mod report;

pub use aggregator::{status_name, DiscoverySummary, EndpointResult, ResultAggregator, Stability};
pub use report::{DiscoveryReport, PatternAnalysis, SweepRecord, SweepRun};
