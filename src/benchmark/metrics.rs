//! Response-time statistics
//!
//! Samples are in seconds, as measured by the HTTP client.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Latency percentiles (p50, p90, p95, p99)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Percentiles {
    /// Calculate percentiles from sorted samples
    pub fn from_sorted(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        Self {
            p50: percentile(samples, 50.0),
            p90: percentile(samples, 90.0),
            p95: percentile(samples, 95.0),
            p99: percentile(samples, 99.0),
        }
    }
}

/// Calculate percentile value from sorted array (linear interpolation)
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let idx = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let fraction = idx - lower as f64;

    if upper >= sorted.len() {
        sorted[sorted.len() - 1]
    } else {
        sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
    }
}

/// Median of unsorted samples
pub fn median(samples: &[f64]) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    percentile(&sorted, 50.0)
}

/// Samples greater than `factor` times the median
pub fn outliers(samples: &[f64], factor: f64) -> Vec<f64> {
    let threshold = median(samples) * factor;
    samples.iter().copied().filter(|t| *t > threshold).collect()
}

/// Latency statistics
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation (n - 1)
    pub std_dev: f64,
    pub percentiles: Percentiles,
    pub count: usize,
}

impl LatencyStats {
    /// Calculate statistics from samples
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let min = sorted[0];
        let max = sorted[count - 1];
        let mean = sorted.iter().sum::<f64>() / count as f64;

        let std_dev = if count > 1 {
            let variance =
                sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };

        Self {
            min,
            max,
            mean,
            std_dev,
            percentiles: Percentiles::from_sorted(&sorted),
            count,
        }
    }

    /// Spread between slowest and fastest sample
    pub fn spread(&self) -> f64 {
        self.max - self.min
    }

    pub fn format_summary(&self) -> String {
        format!(
            "min={:.3}s max={:.3}s avg={:.3}s median={:.3}s stdev={:.3}s p95={:.3}s",
            self.min,
            self.max,
            self.mean,
            self.percentiles.p50,
            self.std_dev,
            self.percentiles.p95
        )
    }
}

/// Counts of requests that never got a response
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorStats {
    pub timeouts: u64,
    pub connection_errors: u64,
    pub other_errors: u64,
}

impl ErrorStats {
    pub fn total(&self) -> u64 {
        self.timeouts + self.connection_errors + self.other_errors
    }
}

/// Collected results of a batch of requests
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub latency: LatencyStats,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub status_codes: Vec<u16>,
    pub errors: ErrorStats,
    pub duration_secs: f64,
}

impl Metrics {
    /// Fraction of requests answered with 200 (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }

    pub fn requests_per_sec(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.total_requests as f64 / self.duration_secs
        } else {
            0.0
        }
    }

    pub fn count_of(&self, status: u16) -> usize {
        self.status_codes.iter().filter(|c| **c == status).count()
    }
}

/// Incremental metrics collector
pub struct MetricsCollector {
    latencies: Vec<f64>,
    status_codes: Vec<u16>,
    start_time: Instant,
    success_count: u64,
    total_count: u64,
    errors: ErrorStats,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            latencies: Vec::new(),
            status_codes: Vec::new(),
            start_time: Instant::now(),
            success_count: 0,
            total_count: 0,
            errors: ErrorStats::default(),
        }
    }

    /// Record a response; latency samples are kept for 200s only
    pub fn record_response(&mut self, status_code: u16, secs: f64) {
        self.total_count += 1;
        self.status_codes.push(status_code);
        if status_code == 200 {
            self.success_count += 1;
            self.latencies.push(secs);
        }
    }

    /// Record a request that failed before a response arrived
    pub fn record_error(&mut self, is_timeout: bool, is_connection_error: bool) {
        self.total_count += 1;
        if is_timeout {
            self.errors.timeouts += 1;
        } else if is_connection_error {
            self.errors.connection_errors += 1;
        } else {
            self.errors.other_errors += 1;
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finalize(self) -> Metrics {
        Metrics {
            latency: LatencyStats::from_samples(&self.latencies),
            total_requests: self.total_count,
            successful_requests: self.success_count,
            status_codes: self.status_codes,
            errors: self.errors,
            duration_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentiles() {
        let data: Vec<f64> = (1..=100).map(|x| x as f64).collect();
        let p = Percentiles::from_sorted(&data);

        assert!((p.p50 - 50.0).abs() < 1.0);
        assert!((p.p90 - 90.0).abs() < 1.0);
        assert!((p.p95 - 95.0).abs() < 1.0);
        assert!((p.p99 - 99.0).abs() < 1.0);
    }

    #[test]
    fn test_latency_stats() {
        let samples = vec![5.0, 1.0, 3.0, 2.0, 4.0];
        let stats = LatencyStats::from_samples(&samples);

        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
        assert_eq!(stats.mean, 3.0);
        assert_eq!(stats.count, 5);
        assert_eq!(stats.spread(), 4.0);
        assert!((stats.std_dev - 2.5f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_single_sample_has_no_deviation() {
        let stats = LatencyStats::from_samples(&[0.4]);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.percentiles.p95, 0.4);
    }

    #[test]
    fn test_median_and_outliers() {
        let samples = vec![0.1, 0.12, 0.11, 0.5, 0.1];
        assert!((median(&samples) - 0.11).abs() < 1e-9);
        assert_eq!(outliers(&samples, 2.0), vec![0.5]);
    }

    #[test]
    fn test_metrics_collector() {
        let mut collector = MetricsCollector::new();
        for i in 0..10 {
            if i < 4 {
                collector.record_response(200, 0.2);
            } else {
                collector.record_response(429, 0.05);
            }
        }
        collector.record_error(true, false);

        let metrics = collector.finalize();
        assert_eq!(metrics.total_requests, 11);
        assert_eq!(metrics.successful_requests, 4);
        assert_eq!(metrics.count_of(429), 6);
        assert_eq!(metrics.latency.count, 4);
        assert_eq!(metrics.errors.timeouts, 1);
        assert_eq!(metrics.errors.total(), 1);
        assert!((metrics.success_rate() - 4.0 / 11.0).abs() < 1e-9);
    }
}
