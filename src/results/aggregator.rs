//! Cross-probe accumulation of observed endpoint behavior
//!
//! Probes (including concurrent workers) record every response they see.
//! At the end of a session the accumulated data is classified per endpoint
//! and rendered as the discovery summary.

#![allow(dead_code)]

use reqwest::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Number of test endpoints the overall counts are reported against
pub const TEST_ENDPOINT_COUNT: usize = 6;

/// Accumulated observations for one endpoint
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EndpointResult {
    pub status_codes: Vec<u16>,
    pub response_times: Vec<f64>,
    pub test_count: u64,
    pub passed: u64,
    pub failed: u64,
}

impl EndpointResult {
    pub fn has_success(&self) -> bool {
        self.status_codes.contains(&200)
    }

    /// Occurrences per status code, ordered by code
    pub fn status_distribution(&self) -> BTreeMap<u16, usize> {
        let mut distribution = BTreeMap::new();
        for code in &self.status_codes {
            *distribution.entry(*code).or_insert(0) += 1;
        }
        distribution
    }

    /// Mean response time in seconds, 0 without samples
    pub fn avg_response_time(&self) -> f64 {
        if self.response_times.is_empty() {
            0.0
        } else {
            self.response_times.iter().sum::<f64>() / self.response_times.len() as f64
        }
    }

    pub fn stability(&self) -> Stability {
        let distribution = self.status_distribution();
        if !self.has_success() {
            Stability::Failed
        } else if distribution.len() == 1 {
            Stability::Stable
        } else {
            Stability::Unstable
        }
    }
}

/// Endpoint classification at session end
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stability {
    /// Only 200s observed
    Stable,
    /// 200s mixed with other codes
    Unstable,
    /// No 200 observed
    Failed,
}

impl Stability {
    pub fn symbol(&self) -> &'static str {
        match self {
            Stability::Stable => "✓",
            Stability::Unstable => "⚠",
            Stability::Failed => "✗",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stability::Stable => "OK",
            Stability::Unstable => "UNSTABLE",
            Stability::Failed => "FAILED",
        }
    }
}

/// Upper snake-case reason phrase (`429` -> `TOO_MANY_REQUESTS`), or `UNKNOWN`
pub fn status_name(code: u16) -> String {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(|reason| {
            reason
                .replace('\'', "")
                .to_uppercase()
                .replace([' ', '-'], "_")
        })
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

/// Thread-safe endpoint result map shared by all probes of a session
#[derive(Clone, Default)]
pub struct ResultAggregator {
    inner: Arc<Mutex<BTreeMap<String, EndpointResult>>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, EndpointResult>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a response; 200 counts as passed, anything else as failed
    pub fn record_response(&self, endpoint: &str, status_code: u16, response_time: f64) {
        let mut map = self.lock();
        let entry = map.entry(endpoint.to_string()).or_default();
        entry.status_codes.push(status_code);
        entry.response_times.push(response_time);
        entry.test_count += 1;
        if status_code == 200 {
            entry.passed += 1;
        } else {
            entry.failed += 1;
        }
    }

    /// Record a response without judging it
    pub fn record_observation(&self, endpoint: &str, status_code: u16, response_time: f64) {
        let mut map = self.lock();
        let entry = map.entry(endpoint.to_string()).or_default();
        entry.status_codes.push(status_code);
        entry.response_times.push(response_time);
        entry.test_count += 1;
    }

    /// Record a request that never produced a response
    pub fn record_error(&self, endpoint: &str) {
        let mut map = self.lock();
        let entry = map.entry(endpoint.to_string()).or_default();
        entry.test_count += 1;
        entry.failed += 1;
    }

    pub fn get(&self, endpoint: &str) -> Option<EndpointResult> {
        self.lock().get(endpoint).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, EndpointResult> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Classify every endpoint and compute the overall figures
    pub fn summary(&self) -> DiscoverySummary {
        DiscoverySummary::from_results(&self.snapshot())
    }
}

/// Sort key: trailing numeric path segment first, non-numeric paths last
fn endpoint_sort_key(path: &str) -> (u8, u64, String) {
    match path.rsplit('/').next().and_then(|s| s.parse::<u64>().ok()) {
        Some(n) => (0, n, path.to_string()),
        None => (1, 0, path.to_string()),
    }
}

/// Per-endpoint line of the discovery summary
#[derive(Clone, Debug, Serialize)]
pub struct EndpointSummary {
    pub endpoint: String,
    pub stability: Stability,
    pub test_count: u64,
    pub passed: u64,
    pub failed: u64,
    pub status_codes: Vec<String>,
    pub avg_response_time: f64,
}

/// End-of-session discovery summary
#[derive(Clone, Debug, Default, Serialize)]
pub struct DiscoverySummary {
    pub endpoints: Vec<EndpointSummary>,
    pub stable: usize,
    pub unstable: usize,
    pub failed: usize,
    pub total_tests: u64,
    pub total_passed: u64,
}

impl DiscoverySummary {
    pub fn from_results(results: &BTreeMap<String, EndpointResult>) -> Self {
        let mut paths: Vec<&String> = results.keys().collect();
        paths.sort_by_key(|p| endpoint_sort_key(p));

        let mut summary = DiscoverySummary::default();

        for path in paths {
            let data = &results[path];
            let stability = data.stability();
            match stability {
                Stability::Stable => summary.stable += 1,
                Stability::Unstable => summary.unstable += 1,
                Stability::Failed => summary.failed += 1,
            }

            summary.total_tests += data.test_count;
            summary.total_passed += data.passed;
            summary.endpoints.push(EndpointSummary {
                endpoint: path.clone(),
                stability,
                test_count: data.test_count,
                passed: data.passed,
                failed: data.failed,
                status_codes: data
                    .status_distribution()
                    .into_iter()
                    .map(|(code, count)| format!("{} {} ({}x)", code, status_name(code), count))
                    .collect(),
                avg_response_time: data.avg_response_time(),
            });
        }

        summary
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Passed over total, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_tests == 0 {
            0.0
        } else {
            self.total_passed as f64 / self.total_tests as f64 * 100.0
        }
    }

    /// Plain-text rendering, one entry per line
    pub fn lines(&self) -> Vec<String> {
        let rule = "=".repeat(80);
        let thin = "-".repeat(80);
        let mut lines = vec![rule.clone(), "ENDPOINT DISCOVERY SUMMARY".to_string(), rule.clone()];

        for ep in &self.endpoints {
            lines.push(String::new());
            lines.push(format!("{} {}", ep.stability.symbol(), ep.endpoint));
            lines.push(format!("   Status: {}", ep.stability.label()));
            lines.push(format!(
                "   Tests: {} | Passed: {} | Failed: {}",
                ep.test_count, ep.passed, ep.failed
            ));
            lines.push(format!("   Observed Status Codes: {}", ep.status_codes.join(", ")));
            lines.push(format!("   Avg Response Time: {:.3}s", ep.avg_response_time));
        }

        lines.push(String::new());
        lines.push(thin.clone());
        lines.push("OVERALL RESULTS".to_string());
        lines.push(thin);
        lines.push(format!("✓ Stable Endpoints:   {}/{}", self.stable, TEST_ENDPOINT_COUNT));
        lines.push(format!("⚠ Unstable Endpoints: {}/{}", self.unstable, TEST_ENDPOINT_COUNT));
        lines.push(format!("✗ Failed Endpoints:   {}/{}", self.failed, TEST_ENDPOINT_COUNT));
        lines.push(String::new());
        lines.push(format!(
            "Total Tests: {} | Passed: {} | Success Rate: {:.1}%",
            self.total_tests,
            self.total_passed,
            self.success_rate()
        ));
        lines.push(rule);
        lines
    }

    /// Emit the summary through the logger
    pub fn log(&self) {
        if self.is_empty() {
            debug!("No endpoint discovery data recorded in this session");
            return;
        }
        for line in self.lines() {
            info!("{}", line);
        }
    }
}
