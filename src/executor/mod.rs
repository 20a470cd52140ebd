//! Probe execution
//!
//! Sequential session runner plus the bounded worker pool used by probes
//! that fire concurrent requests.

mod parallel;
mod runner;

pub use parallel::{ParallelExecutor, RequestOutcome};
pub use runner::ProbeRunner;
