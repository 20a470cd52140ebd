//! Output formatting module
//!
//! Renders sessions as tables, JSON or a one-line summary.

mod formatter;

pub use formatter::{write_results_to_file, OutputFormat, ResultFormatter};
