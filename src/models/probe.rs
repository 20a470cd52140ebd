//! Probe catalogue, outcomes and session summaries
//!
//! Every discovery or regression routine is a numbered [`ProbeCase`]
//! belonging to one category. Running a probe yields a [`ProbeResult`].

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// All probes known to the harness
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeCase {
    // Health (1-2)
    HealthCheck,
    HealthConsistency,

    // Schema (3-6)
    SchemaAvailability,
    SchemaStructure,
    SchemaTestEndpoints,
    SchemaCompliance,

    // Functional (7-9)
    EndpointAvailability,
    ResponseEnvelope,
    CounterData,

    // Discovery (10-23)
    EndpointSweep,
    WarmupRecovery,
    WarmupCycles,
    WarmupRateLimit,
    RateLimitPersistence,
    BurstRateLimit,
    CooldownWindow,
    RateLimitIsolation,
    FixedDelay,
    ResponseTimeConsistency,
    RedirectDetection,
    ServerRouting,
    CallSequence,
    HttpMethods,

    // Performance (24-26)
    ConcurrentRequests,
    LatencyThresholds,
    BurstLoad,

    // Reliability (27-31)
    RetryResilience,
    TimeoutEnforcement,
    DnsFailure,
    EndpointRecovery,
    ConcurrentResilience,

    // Security (32-39)
    UnauthenticatedAccess,
    InvalidTokens,
    InvalidRefreshToken,
    MissingRefreshParameter,
    RefreshTokenSingleUse,
    SharedTokenConcurrency,
    RapidRequests,
    TokenExpiry,

    // Regression (40-47)
    BrokenEndpoint,
    ColdStart,
    DelayRemoved,
    TokenGeneration,
    TokenReuse,
    ErrorRecovery,
    ConcurrentEndpointAccess,
    SequentialChain,
}

/// Every probe in number order; a probe's number is its position plus one
const CATALOGUE: [ProbeCase; 47] = [
    ProbeCase::HealthCheck,
    ProbeCase::HealthConsistency,
    ProbeCase::SchemaAvailability,
    ProbeCase::SchemaStructure,
    ProbeCase::SchemaTestEndpoints,
    ProbeCase::SchemaCompliance,
    ProbeCase::EndpointAvailability,
    ProbeCase::ResponseEnvelope,
    ProbeCase::CounterData,
    ProbeCase::EndpointSweep,
    ProbeCase::WarmupRecovery,
    ProbeCase::WarmupCycles,
    ProbeCase::WarmupRateLimit,
    ProbeCase::RateLimitPersistence,
    ProbeCase::BurstRateLimit,
    ProbeCase::CooldownWindow,
    ProbeCase::RateLimitIsolation,
    ProbeCase::FixedDelay,
    ProbeCase::ResponseTimeConsistency,
    ProbeCase::RedirectDetection,
    ProbeCase::ServerRouting,
    ProbeCase::CallSequence,
    ProbeCase::HttpMethods,
    ProbeCase::ConcurrentRequests,
    ProbeCase::LatencyThresholds,
    ProbeCase::BurstLoad,
    ProbeCase::RetryResilience,
    ProbeCase::TimeoutEnforcement,
    ProbeCase::DnsFailure,
    ProbeCase::EndpointRecovery,
    ProbeCase::ConcurrentResilience,
    ProbeCase::UnauthenticatedAccess,
    ProbeCase::InvalidTokens,
    ProbeCase::InvalidRefreshToken,
    ProbeCase::MissingRefreshParameter,
    ProbeCase::RefreshTokenSingleUse,
    ProbeCase::SharedTokenConcurrency,
    ProbeCase::RapidRequests,
    ProbeCase::TokenExpiry,
    ProbeCase::BrokenEndpoint,
    ProbeCase::ColdStart,
    ProbeCase::DelayRemoved,
    ProbeCase::TokenGeneration,
    ProbeCase::TokenReuse,
    ProbeCase::ErrorRecovery,
    ProbeCase::ConcurrentEndpointAccess,
    ProbeCase::SequentialChain,
];

impl ProbeCase {
    /// Probe number (1-47)
    pub fn number(&self) -> u8 {
        CATALOGUE
            .iter()
            .position(|p| p == self)
            .map_or(0, |i| i as u8 + 1)
    }

    /// Human readable name
    pub fn name(&self) -> &'static str {
        match self {
            ProbeCase::HealthCheck => "Health Check",
            ProbeCase::HealthConsistency => "Health Consistency",
            ProbeCase::SchemaAvailability => "Schema Availability",
            ProbeCase::SchemaStructure => "Schema Structure",
            ProbeCase::SchemaTestEndpoints => "Schema Test Endpoints",
            ProbeCase::SchemaCompliance => "Schema Compliance",
            ProbeCase::EndpointAvailability => "Endpoint Availability",
            ProbeCase::ResponseEnvelope => "Response Envelope",
            ProbeCase::CounterData => "Endpoint 6 Data",
            ProbeCase::EndpointSweep => "Endpoint Sweep",
            ProbeCase::WarmupRecovery => "Endpoint 3 Warmup",
            ProbeCase::WarmupCycles => "Endpoint 3 Warmup Cycles",
            ProbeCase::WarmupRateLimit => "Endpoint 3 Rate Limit",
            ProbeCase::RateLimitPersistence => "Endpoint 3 Rate Limit Persistence",
            ProbeCase::BurstRateLimit => "Endpoint 4 Rate Limit",
            ProbeCase::CooldownWindow => "Endpoint 4 Cooldown",
            ProbeCase::RateLimitIsolation => "Rate Limit Isolation",
            ProbeCase::FixedDelay => "Endpoint 5 Delay",
            ProbeCase::ResponseTimeConsistency => "Response Time Consistency",
            ProbeCase::RedirectDetection => "Redirect Detection",
            ProbeCase::ServerRouting => "Server Routing",
            ProbeCase::CallSequence => "Call Sequence",
            ProbeCase::HttpMethods => "HTTP Methods",
            ProbeCase::ConcurrentRequests => "Concurrent Requests",
            ProbeCase::LatencyThresholds => "Latency Thresholds",
            ProbeCase::BurstLoad => "Burst Load",
            ProbeCase::RetryResilience => "Retry Resilience",
            ProbeCase::TimeoutEnforcement => "Timeout Enforcement",
            ProbeCase::DnsFailure => "DNS Failure",
            ProbeCase::EndpointRecovery => "Endpoint 6 Recovery",
            ProbeCase::ConcurrentResilience => "Concurrent Resilience",
            ProbeCase::UnauthenticatedAccess => "Unauthenticated Access",
            ProbeCase::InvalidTokens => "Invalid Tokens",
            ProbeCase::InvalidRefreshToken => "Invalid Refresh Token",
            ProbeCase::MissingRefreshParameter => "Missing Refresh Parameter",
            ProbeCase::RefreshTokenSingleUse => "Refresh Token Single Use",
            ProbeCase::SharedTokenConcurrency => "Shared Token Concurrency",
            ProbeCase::RapidRequests => "Rapid Successive Requests",
            ProbeCase::TokenExpiry => "Token Expiry",
            ProbeCase::BrokenEndpoint => "Endpoint 2 Broken",
            ProbeCase::ColdStart => "Endpoint 3 Cold Start",
            ProbeCase::DelayRemoved => "Endpoint 5 Delay Removed",
            ProbeCase::TokenGeneration => "Token Generation",
            ProbeCase::TokenReuse => "Token Reuse",
            ProbeCase::ErrorRecovery => "Recovery After Rejection",
            ProbeCase::ConcurrentEndpointAccess => "Concurrent Endpoint Access",
            ProbeCase::SequentialChain => "Sequential Endpoint Chain",
        }
    }

    /// Probe category
    pub fn category(&self) -> &'static str {
        match self.number() {
            1..=2 => "Health",
            3..=6 => "Schema",
            7..=9 => "Functional",
            10..=23 => "Discovery",
            24..=26 => "Performance",
            27..=31 => "Reliability",
            32..=39 => "Security",
            _ => "Regression",
        }
    }

    /// Slow probes sleep for tens of seconds or minutes and only run on request
    pub fn is_slow(&self) -> bool {
        matches!(
            self,
            ProbeCase::EndpointSweep
                | ProbeCase::WarmupCycles
                | ProbeCase::WarmupRateLimit
                | ProbeCase::RateLimitPersistence
                | ProbeCase::CooldownWindow
                | ProbeCase::RateLimitIsolation
                | ProbeCase::ResponseTimeConsistency
                | ProbeCase::CallSequence
                | ProbeCase::TokenExpiry
                | ProbeCase::ColdStart
        )
    }

    /// Documented defect; a failing probe with a known issue is an expected failure
    pub fn known_issue(&self) -> Option<&'static str> {
        match self {
            ProbeCase::BrokenEndpoint => Some("Endpoint 2 answers 500 instead of 200"),
            ProbeCase::ColdStart => Some("Endpoint 3 answers 503 after being idle"),
            ProbeCase::DelayRemoved => Some("Endpoint 5 has an artificial ~4s delay"),
            _ => None,
        }
    }

    /// All probes in number order
    pub fn all() -> Vec<ProbeCase> {
        CATALOGUE.to_vec()
    }

    /// Probes of one category (case-insensitive)
    pub fn by_category(category: &str) -> Vec<ProbeCase> {
        ProbeCase::all()
            .into_iter()
            .filter(|p| p.category().eq_ignore_ascii_case(category))
            .collect()
    }

    /// Parse from probe number
    pub fn from_number(n: u8) -> Option<ProbeCase> {
        (n as usize)
            .checked_sub(1)
            .and_then(|i| CATALOGUE.get(i))
            .copied()
    }
}

impl fmt::Display for ProbeCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Probe {}: {}", self.number(), self.name())
    }
}

/// Probe execution status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Pass,
    Fail,
    Skip,
    Error,
    /// Failed in the way a documented defect predicts
    XFail,
}

impl ProbeStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            ProbeStatus::Pass => "✓",
            ProbeStatus::Fail => "✗",
            ProbeStatus::Skip => "○",
            ProbeStatus::Error => "!",
            ProbeStatus::XFail => "x",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeStatus::Pass)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Pass => write!(f, "PASS"),
            ProbeStatus::Fail => write!(f, "FAIL"),
            ProbeStatus::Skip => write!(f, "SKIP"),
            ProbeStatus::Error => write!(f, "ERROR"),
            ProbeStatus::XFail => write!(f, "XFAIL"),
        }
    }
}

/// Result of a single probe execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProbeResult {
    pub probe: ProbeCase,
    pub status: ProbeStatus,
    pub duration_ms: u64,
    pub message: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl ProbeResult {
    pub fn pass(probe: ProbeCase, duration_ms: u64) -> Self {
        Self {
            probe,
            status: ProbeStatus::Pass,
            duration_ms,
            message: None,
            details: None,
        }
    }

    pub fn fail(probe: ProbeCase, duration_ms: u64, message: impl Into<String>) -> Self {
        Self {
            probe,
            status: ProbeStatus::Fail,
            duration_ms,
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn xfail(probe: ProbeCase, duration_ms: u64, message: impl Into<String>) -> Self {
        Self {
            probe,
            status: ProbeStatus::XFail,
            duration_ms,
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn skip(probe: ProbeCase, reason: impl Into<String>) -> Self {
        Self {
            probe,
            status: ProbeStatus::Skip,
            duration_ms: 0,
            message: Some(reason.into()),
            details: None,
        }
    }

    pub fn error(probe: ProbeCase, duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            probe,
            status: ProbeStatus::Error,
            duration_ms,
            message: Some(error.into()),
            details: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.status.symbol(),
            self.probe,
            self.duration_ms
        )?;
        if let Some(msg) = &self.message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Summary of one probing session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub base_url: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub xfailed: usize,
    pub total_duration_ms: u64,
    pub results: Vec<ProbeResult>,
}

impl SessionSummary {
    pub fn new(base_url: impl Into<String>, results: Vec<ProbeResult>) -> Self {
        let count = |status: ProbeStatus| results.iter().filter(|r| r.status == status).count();

        Self {
            base_url: base_url.into(),
            total: results.len(),
            passed: count(ProbeStatus::Pass),
            failed: count(ProbeStatus::Fail),
            skipped: count(ProbeStatus::Skip),
            errors: count(ProbeStatus::Error),
            xfailed: count(ProbeStatus::XFail),
            total_duration_ms: results.iter().map(|r| r.duration_ms).sum(),
            results,
        }
    }

    /// Pass rate over probes that actually ran
    pub fn pass_rate(&self) -> f64 {
        let ran = self.total - self.skipped;
        if ran == 0 {
            0.0
        } else {
            (self.passed as f64 / ran as f64) * 100.0
        }
    }

    /// No unexpected failures or errors
    pub fn is_green(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Session against {}", self.base_url)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for result in &self.results {
            writeln!(f, "  {result}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | XFail: {} | Skip: {} | Error: {}",
            self.total, self.passed, self.failed, self.xfailed, self.skipped, self.errors
        )?;
        writeln!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate(),
            self.total_duration_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_numbers() {
        assert_eq!(ProbeCase::HealthCheck.number(), 1);
        assert_eq!(ProbeCase::EndpointSweep.number(), 10);
        assert_eq!(ProbeCase::ConcurrentRequests.number(), 24);
        assert_eq!(ProbeCase::DelayRemoved.number(), 42);
        assert_eq!(ProbeCase::SequentialChain.number(), 47);
    }

    #[test]
    fn test_probe_from_number_roundtrips_every_case() {
        for probe in ProbeCase::all() {
            assert_eq!(ProbeCase::from_number(probe.number()), Some(probe));
        }
        assert_eq!(ProbeCase::from_number(0), None);
        assert_eq!(ProbeCase::from_number(48), None);
    }

    #[test]
    fn test_all_probes() {
        assert_eq!(ProbeCase::all().len(), 47);
        let numbers: Vec<u8> = ProbeCase::all().iter().map(ProbeCase::number).collect();
        assert_eq!(numbers, (1..=47).collect::<Vec<u8>>());
    }

    #[test]
    fn test_categories() {
        assert_eq!(ProbeCase::by_category("schema").len(), 4);
        assert_eq!(ProbeCase::by_category("Security").len(), 8);
        assert_eq!(ProbeCase::by_category("discovery").len(), 14);
        assert_eq!(ProbeCase::by_category("Reliability").len(), 5);
        assert_eq!(ProbeCase::by_category("Regression").len(), 8);
        assert_eq!(ProbeCase::TokenGeneration.category(), "Regression");
        assert_eq!(ProbeCase::BurstRateLimit.category(), "Discovery");
        assert!(ProbeCase::by_category("nonexistent").is_empty());
    }

    #[test]
    fn test_known_issues_are_regressions() {
        for probe in ProbeCase::all() {
            if probe.known_issue().is_some() {
                assert_eq!(probe.category(), "Regression");
            }
        }
    }

    #[test]
    fn test_session_summary() {
        let results = vec![
            ProbeResult::pass(ProbeCase::HealthCheck, 100),
            ProbeResult::fail(ProbeCase::SchemaStructure, 50, "missing paths"),
            ProbeResult::skip(ProbeCase::TokenExpiry, "slow"),
            ProbeResult::xfail(ProbeCase::BrokenEndpoint, 30, "500"),
        ];

        let summary = SessionSummary::new("http://localhost", results);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.xfailed, 1);
        assert_eq!(summary.total_duration_ms, 180);
        assert!((summary.pass_rate() - 33.333).abs() < 0.01);
        assert!(!summary.is_green());
    }
}
