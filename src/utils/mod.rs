//! Shared utilities

pub mod logger;

pub use logger::{init_logging, LogGuards, LogLevel, LogSettings};
