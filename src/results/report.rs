//! Endpoint discovery report
//!
//! The endpoint sweep appends one section per run to a timestamped text file
//! (`endpoint_discovery_<YYYYmmdd_HHMMSS>.txt`), including a small pattern
//! analysis of the observed status codes.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

/// Parameters of one sweep run
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SweepRun {
    pub endpoint: u8,
    pub requests: usize,
    /// Base delay between requests in seconds
    pub delay: f64,
    /// Multiply the delay by 1.5 after every request
    pub increasing: bool,
}

impl SweepRun {
    pub const fn new(endpoint: u8, requests: usize, delay: f64, increasing: bool) -> Self {
        Self {
            endpoint,
            requests,
            delay,
            increasing,
        }
    }
}

/// One request of a sweep run
#[derive(Clone, Debug, Serialize)]
pub struct SweepRecord {
    pub request_num: usize,
    pub status_code: u16,
    pub response_time: f64,
    pub delay_before: f64,
    pub body: String,
    /// First 200 after at least one error
    pub recovered: bool,
}

/// What a run's status codes suggest about the endpoint
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatternAnalysis {
    pub distribution: BTreeMap<u16, usize>,
    /// 1-based index of the first success, when earlier requests failed
    pub warmup_at: Option<usize>,
    /// Number of 429 responses
    pub throttled: usize,
}

impl PatternAnalysis {
    pub fn from_records(records: &[SweepRecord]) -> Self {
        let mut distribution = BTreeMap::new();
        for r in records {
            *distribution.entry(r.status_code).or_insert(0) += 1;
        }

        let successes = distribution.get(&200).copied().unwrap_or(0);
        let errors = records.len() - successes;

        let warmup_at = if errors > 0 && successes > 0 {
            records
                .iter()
                .position(|r| r.status_code == 200)
                .filter(|idx| *idx > 0)
                .map(|idx| idx + 1)
        } else {
            None
        };

        Self {
            throttled: distribution.get(&429).copied().unwrap_or(0),
            distribution,
            warmup_at,
        }
    }

    /// The single status code every request returned
    pub fn consistent_status(&self) -> Option<u16> {
        if self.distribution.len() == 1 {
            self.distribution.keys().next().copied()
        } else {
            None
        }
    }

    fn distribution_text(&self) -> String {
        let parts: Vec<String> = self
            .distribution
            .iter()
            .map(|(code, count)| format!("{code}: {count}"))
            .collect();
        format!("{{{}}}", parts.join(", "))
    }
}

/// Text report written by the endpoint sweep
pub struct DiscoveryReport {
    path: PathBuf,
}

impl DiscoveryReport {
    /// Create the report file under `dir` and write its header
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create report directory: {}", dir.display()))?;

        let now = Local::now();
        let path = dir.join(format!("endpoint_discovery_{}.txt", now.format("%Y%m%d_%H%M%S")));

        let rule = "=".repeat(80);
        let header = format!(
            "{rule}\nAPI ENDPOINT DISCOVERY REPORT\nGenerated: {}\n{rule}\n\n",
            now.format("%Y-%m-%d %H:%M:%S")
        );
        std::fs::write(&path, header)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one run's section
    pub fn write_run(&self, run: &SweepRun, records: &[SweepRecord]) -> Result<()> {
        let section = render_run(run, records).context("Failed to render report section")?;

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open report: {}", self.path.display()))?;
        file.write_all(section.as_bytes())
            .with_context(|| format!("Failed to append to report: {}", self.path.display()))?;
        Ok(())
    }
}

/// Render a run section
pub fn render_run(run: &SweepRun, records: &[SweepRecord]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let rule = "=".repeat(80);
    let thin = "-".repeat(80);

    writeln!(out, "\n{rule}")?;
    writeln!(out, "ENDPOINT /api/test/{}", run.endpoint)?;
    writeln!(out, "{rule}")?;
    writeln!(out, "Test Configuration:")?;
    writeln!(out, "  - Number of Requests: {}", run.requests)?;
    writeln!(out, "  - Base Delay: {}s", run.delay)?;
    writeln!(out, "  - Increasing Delay: {}", run.increasing)?;
    writeln!(out)?;

    let analysis = PatternAnalysis::from_records(records);
    let total = records.len();
    let successes = analysis.distribution.get(&200).copied().unwrap_or(0);
    let success_rate = if total > 0 {
        successes as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    writeln!(out, "Results Summary:")?;
    writeln!(out, "  - Total Requests: {total}")?;
    writeln!(out, "  - Successful (200): {successes}")?;
    writeln!(out, "  - Failed: {}", total - successes)?;
    writeln!(out, "  - Success Rate: {success_rate:.1}%")?;
    writeln!(out)?;

    let times: Vec<f64> = records.iter().map(|r| r.response_time).collect();
    let (avg, min, max) = if times.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        (
            times.iter().sum::<f64>() / times.len() as f64,
            times.iter().copied().fold(f64::INFINITY, f64::min),
            times.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        )
    };

    writeln!(out, "Response Time Analysis:")?;
    writeln!(out, "  - Average: {avg:.3}s")?;
    writeln!(out, "  - Minimum: {min:.3}s")?;
    writeln!(out, "  - Maximum: {max:.3}s")?;
    writeln!(out)?;

    writeln!(out, "Detailed Request Log:")?;
    writeln!(out, "{thin}")?;
    for r in records {
        let symbol = if r.status_code == 200 { "✓" } else { "✗" };
        write!(
            out,
            "Request #{:2}: {} Status={} Time={:.3}s Delay={:.3}s",
            r.request_num, symbol, r.status_code, r.response_time, r.delay_before
        )?;
        if r.recovered {
            write!(out, " [RECOVERED FROM ERROR]")?;
        }
        if !r.body.is_empty() {
            write!(out, "\n              Body: {}", r.body)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "\n{thin}")?;
    writeln!(out, "Pattern Analysis:")?;
    match analysis.consistent_status() {
        Some(code) => writeln!(out, "  ✓ CONSISTENT: All requests returned {code}")?,
        None => {
            writeln!(out, "  ⚠ INCONSISTENT: Multiple status codes observed")?;
            writeln!(
                out,
                "    Status code distribution: {}",
                analysis.distribution_text()
            )?;
        }
    }
    if let Some(at) = analysis.warmup_at {
        writeln!(out, "  ⚠ WARMUP REQUIRED: First success at request #{at}")?;
    }
    if analysis.throttled > 0 {
        writeln!(
            out,
            "  ⚠ RATE LIMITING DETECTED: {} requests throttled",
            analysis.throttled
        )?;
    }
    writeln!(out)?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(n: usize, status: u16) -> SweepRecord {
        SweepRecord {
            request_num: n,
            status_code: status,
            response_time: 0.1 * n as f64,
            delay_before: 0.0,
            body: String::new(),
            recovered: false,
        }
    }

    #[test]
    fn test_consistent_pattern() {
        let records = vec![record(1, 200), record(2, 200)];
        let analysis = PatternAnalysis::from_records(&records);
        assert_eq!(analysis.consistent_status(), Some(200));
        assert_eq!(analysis.warmup_at, None);
        assert_eq!(analysis.throttled, 0);
    }

    #[test]
    fn test_warmup_pattern() {
        let records = vec![record(1, 503), record(2, 503), record(3, 200)];
        let analysis = PatternAnalysis::from_records(&records);
        assert_eq!(analysis.consistent_status(), None);
        assert_eq!(analysis.warmup_at, Some(3));
    }

    #[test]
    fn test_rate_limit_pattern_is_not_warmup() {
        let records = vec![
            record(1, 200),
            record(2, 200),
            record(3, 429),
            record(4, 429),
        ];
        let analysis = PatternAnalysis::from_records(&records);
        assert_eq!(analysis.throttled, 2);
        assert_eq!(analysis.warmup_at, None);
        assert_eq!(analysis.distribution_text(), "{200: 2, 429: 2}");
    }

    #[test]
    fn test_render_run() {
        let run = SweepRun::new(3, 3, 0.5, true);
        let mut records = vec![record(1, 503), record(2, 200), record(3, 200)];
        records[1].recovered = true;
        records[1].body = r#"{"status":"success"}"#.to_string();

        let text = render_run(&run, &records).unwrap();
        assert!(text.contains("ENDPOINT /api/test/3"));
        assert!(text.contains("  - Increasing Delay: true"));
        assert!(text.contains("  - Success Rate: 66.7%"));
        assert!(text.contains("  - Maximum: 0.300s"));
        assert!(text.contains("Request # 2: ✓ Status=200 Time=0.200s Delay=0.000s [RECOVERED FROM ERROR]"));
        assert!(text.contains("Body: {\"status\":\"success\"}"));
        assert!(text.contains("⚠ WARMUP REQUIRED: First success at request #2"));
    }

    #[test]
    fn test_render_empty_run() {
        let text = render_run(&SweepRun::new(1, 0, 0.0, false), &[]).unwrap();
        assert!(text.contains("  - Success Rate: 0.0%"));
    }

    #[test]
    fn test_report_file() {
        let dir = tempdir().unwrap();
        let report = DiscoveryReport::create(dir.path().join("reports")).unwrap();

        let name = report.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("endpoint_discovery_"));
        assert!(name.ends_with(".txt"));

        report
            .write_run(&SweepRun::new(1, 1, 0.0, false), &[record(1, 200)])
            .unwrap();
        report
            .write_run(&SweepRun::new(2, 1, 0.0, false), &[record(1, 500)])
            .unwrap();

        let content = std::fs::read_to_string(report.path()).unwrap();
        assert!(content.starts_with(&"=".repeat(80)));
        assert!(content.contains("API ENDPOINT DISCOVERY REPORT"));
        assert!(content.contains("ENDPOINT /api/test/1"));
        assert!(content.contains("ENDPOINT /api/test/2"));
        assert!(content.contains("✓ CONSISTENT: All requests returned 500"));
    }
}
