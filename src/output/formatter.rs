//! Output formatters for probe results
//!
//! Table, JSON and one-line summary renderings of a session and of the
//! endpoint discovery summary.

#![allow(dead_code)]

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::models::{ProbeCase, ProbeResult, ProbeStatus, SessionSummary};
use crate::results::{DiscoverySummary, Stability};

const TABLE_WIDTH: usize = 78;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Session plus endpoint summary, as written in JSON output
#[derive(Serialize)]
struct SessionReport<'a> {
    session: &'a SessionSummary,
    endpoints: &'a DiscoverySummary,
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.colorize {
            format!("\x1b[{color}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn status_label(&self, status: ProbeStatus) -> String {
        let (label, color) = match status {
            ProbeStatus::Pass => ("✓ PASS", "32"),
            ProbeStatus::Fail => ("✗ FAIL", "31"),
            ProbeStatus::XFail => ("x XFAIL", "35"),
            ProbeStatus::Skip => ("○ SKIP", "33"),
            ProbeStatus::Error => ("! ERROR", "31"),
        };
        self.paint(label, color)
    }

    /// Format a single probe result
    pub fn format_result(&self, result: &ProbeResult) -> String {
        match self.format {
            OutputFormat::Table => self.format_result_row(result),
            OutputFormat::Json => serde_json::to_string(result).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Summary => format!(
                "{} {} ({}ms)",
                result.status.symbol(),
                result.probe.name(),
                result.duration_ms
            ),
        }
    }

    fn format_result_row(&self, result: &ProbeResult) -> String {
        format!(
            "{:2}. {:30} {:10} {} [{:>7}ms]",
            result.probe.number(),
            result.probe.name(),
            result.probe.category(),
            self.status_label(result.status),
            result.duration_ms
        )
    }

    /// Format a whole session together with the endpoint summary
    pub fn format_session(&self, summary: &SessionSummary, endpoints: &DiscoverySummary) -> String {
        let report = SessionReport {
            session: summary,
            endpoints,
        };
        match self.format {
            OutputFormat::Table => {
                let mut output = self.format_session_table(summary);
                if !endpoints.is_empty() {
                    output.push_str(&self.format_endpoints_table(endpoints));
                }
                output
            }
            OutputFormat::Json => serde_json::to_string(&report).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&report).unwrap_or_default(),
            OutputFormat::Summary => self.format_session_brief(summary),
        }
    }

    fn format_session_table(&self, summary: &SessionSummary) -> String {
        let bar = "═".repeat(TABLE_WIDTH);
        let mut output = String::new();

        output.push_str(&format!("\n╔{bar}╗\n"));
        output.push_str(&format!("║ {:<width$} ║\n", format!("Session against {}", summary.base_url), width = TABLE_WIDTH - 2));
        output.push_str(&format!("╠{bar}╣\n"));

        for result in &summary.results {
            output.push_str(&format!("║ {}\n", self.format_result_row(result)));
            if result.status != ProbeStatus::Pass {
                if let Some(message) = &result.message {
                    output.push_str(&format!("║     {}\n", truncate(message, TABLE_WIDTH - 6)));
                }
            }
        }

        output.push_str(&format!("╠{bar}╣\n"));

        let passed = self.paint(&summary.passed.to_string(), "32");
        let failed = if summary.failed > 0 {
            self.paint(&summary.failed.to_string(), "31")
        } else {
            summary.failed.to_string()
        };
        output.push_str(&format!(
            "║ Total: {} | Pass: {} | Fail: {} | XFail: {} | Skip: {} | Error: {}\n",
            summary.total, passed, failed, summary.xfailed, summary.skipped, summary.errors
        ));
        output.push_str(&format!(
            "║ Pass Rate: {:5.1}% | Duration: {}ms\n",
            summary.pass_rate(),
            summary.total_duration_ms
        ));
        output.push_str(&format!("╚{bar}╝\n"));

        output
    }

    fn format_session_brief(&self, summary: &SessionSummary) -> String {
        format!(
            "{}: {}/{} passed ({:.1}%), {} failed, {} xfailed, {} skipped, {} errors in {}ms",
            summary.base_url,
            summary.passed,
            summary.total,
            summary.pass_rate(),
            summary.failed,
            summary.xfailed,
            summary.skipped,
            summary.errors,
            summary.total_duration_ms
        )
    }

    fn format_endpoints_table(&self, endpoints: &DiscoverySummary) -> String {
        let mut output = String::new();

        output.push_str("\n┌──────────────┬──────────┬───────┬────────┬────────┬──────────┐\n");
        output.push_str("│ Endpoint     │ Status   │ Tests │ Passed │ Failed │ Avg      │\n");
        output.push_str("├──────────────┼──────────┼───────┼────────┼────────┼──────────┤\n");

        for ep in &endpoints.endpoints {
            let label = format!("{:8}", ep.stability.label());
            let label = match ep.stability {
                Stability::Stable => self.paint(&label, "32"),
                Stability::Unstable => self.paint(&label, "33"),
                Stability::Failed => self.paint(&label, "31"),
            };
            output.push_str(&format!(
                "│ {:12} │ {} │ {:5} │ {:6} │ {:6} │ {:>7.3}s │\n",
                ep.endpoint, label, ep.test_count, ep.passed, ep.failed, ep.avg_response_time
            ));
        }

        output.push_str("└──────────────┴──────────┴───────┴────────┴────────┴──────────┘\n");
        output.push_str(&format!(
            " Stable: {} | Unstable: {} | Failed: {} | Success Rate: {:.1}%\n",
            endpoints.stable,
            endpoints.unstable,
            endpoints.failed,
            endpoints.success_rate()
        ));

        output
    }

    /// Probe catalogue for `list`
    pub fn format_catalogue(&self, probes: &[ProbeCase], detailed: bool) -> String {
        let mut output = String::new();
        let mut category = "";

        for probe in probes {
            if probe.category() != category {
                category = probe.category();
                output.push_str(&format!("\n{}\n", self.paint(category, "1")));
            }

            let slow = if probe.is_slow() { " (slow)" } else { "" };
            output.push_str(&format!("  {:2}. {}{}\n", probe.number(), probe.name(), slow));

            if detailed {
                if let Some(issue) = probe.known_issue() {
                    output.push_str(&format!("      known issue: {issue}\n"));
                }
            }
        }

        output
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

/// Write a session to a file, uncolored
pub fn write_results_to_file(
    path: impl AsRef<Path>,
    summary: &SessionSummary,
    endpoints: &DiscoverySummary,
    format: OutputFormat,
) -> Result<()> {
    let path = path.as_ref();
    let content = ResultFormatter::new(format)
        .no_color()
        .format_session(summary, endpoints);

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write results to {}", path.display()))
}
