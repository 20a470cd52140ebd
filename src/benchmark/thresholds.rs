//! Per-endpoint performance expectations

use serde::Serialize;

use crate::models::TestEndpoint;

/// Expectations for a batch of concurrent requests
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PerformanceThreshold {
    /// Maximum mean response time in seconds
    pub max_avg: f64,
    /// Minimum fraction of 200s
    pub min_success_rate: f64,
    /// Maximum 95th percentile in seconds
    pub max_p95: f64,
    /// Known to fail; results are reported, not asserted
    pub expected_failure: bool,
    /// Requests to fire before measuring
    pub warmup_requests: usize,
}

impl PerformanceThreshold {
    const fn new(max_avg: f64, min_success_rate: f64, max_p95: f64) -> Self {
        Self {
            max_avg,
            min_success_rate,
            max_p95,
            expected_failure: false,
            warmup_requests: 0,
        }
    }

    const fn expected_failure(mut self) -> Self {
        self.expected_failure = true;
        self
    }

    const fn warmup(mut self, requests: usize) -> Self {
        self.warmup_requests = requests;
        self
    }

    pub fn for_endpoint(endpoint: TestEndpoint) -> Self {
        match endpoint {
            TestEndpoint::One => Self::new(1.0, 1.0, 1.5),
            TestEndpoint::Two => Self::new(2.0, 0.0, 3.0).expected_failure(),
            TestEndpoint::Three => Self::new(2.0, 0.95, 3.0).warmup(3),
            TestEndpoint::Four => Self::new(3.5, 0.5, 5.0).expected_failure(),
            TestEndpoint::Five => Self::new(5.0, 0.95, 6.0),
            TestEndpoint::Six => Self::new(1.0, 1.0, 1.5),
        }
    }

    /// Threshold violations for the observed figures
    pub fn violations(&self, avg: f64, p95: f64, success_rate: f64) -> Vec<String> {
        let mut violations = Vec::new();
        if success_rate < self.min_success_rate {
            violations.push(format!(
                "success rate {:.1}% below {:.1}%",
                success_rate * 100.0,
                self.min_success_rate * 100.0
            ));
        }
        if avg > self.max_avg {
            violations.push(format!("avg {:.3}s above {:.1}s", avg, self.max_avg));
        }
        if p95 > self.max_p95 {
            violations.push(format!("p95 {:.3}s above {:.1}s", p95, self.max_p95));
        }
        violations
    }
}

/// Latency bands for a single request
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LatencyThreshold {
    pub good: f64,
    pub acceptable: f64,
    pub slow: f64,
    pub needs_warmup: bool,
}

impl LatencyThreshold {
    const fn new(good: f64, acceptable: f64, slow: f64) -> Self {
        Self {
            good,
            acceptable,
            slow,
            needs_warmup: false,
        }
    }

    pub fn for_endpoint(endpoint: TestEndpoint) -> Self {
        match endpoint {
            TestEndpoint::One | TestEndpoint::Two | TestEndpoint::Six => Self::new(1.0, 2.0, 5.0),
            TestEndpoint::Three => Self {
                needs_warmup: true,
                ..Self::new(2.0, 3.0, 5.0)
            },
            TestEndpoint::Four => Self::new(3.5, 4.5, 6.0),
            TestEndpoint::Five => Self::new(5.0, 6.0, 7.0),
        }
    }

    pub fn grade(&self, secs: f64) -> LatencyGrade {
        if secs <= self.good {
            LatencyGrade::Good
        } else if secs <= self.acceptable {
            LatencyGrade::Acceptable
        } else if secs <= self.slow {
            LatencyGrade::Slow
        } else {
            LatencyGrade::Critical
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyGrade {
    Good,
    Acceptable,
    Slow,
    Critical,
}

impl LatencyGrade {
    pub fn label(&self) -> &'static str {
        match self {
            LatencyGrade::Good => "GOOD",
            LatencyGrade::Acceptable => "ACCEPTABLE",
            LatencyGrade::Slow => "SLOW",
            LatencyGrade::Critical => "CRITICAL",
        }
    }
}
