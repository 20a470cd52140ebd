//! Performance probes (24-26)

use anyhow::Result;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::{pause, ProbeContext, ProbeOutcome};
use crate::benchmark::{LatencyGrade, LatencyThreshold, PerformanceThreshold};
use crate::executor::ParallelExecutor;
use crate::models::TestEndpoint;
use crate::utils::logger::log_metric;

const CONCURRENT_REQUESTS: usize = 10;
const CONCURRENT_WORKERS: usize = 5;
const BURST_REQUESTS: usize = 50;
const BURST_WORKERS: usize = 20;
const WARMUP_SPACING_SECS: f64 = 0.2;

/// 95th percentile as the slowest sample for small batches
fn p95_latency(samples: &[f64]) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    if sorted.len() >= 20 {
        sorted[sorted.len() * 95 / 100]
    } else {
        sorted.last().copied().unwrap_or(0.0)
    }
}

async fn warm_up(ctx: &ProbeContext, path: &str, token: &str, requests: usize) {
    for i in 1..=requests {
        match ctx.get(path, Some(token)).await {
            Ok(_) => info!("Warmup request {}/{} completed for {}", i, requests, path),
            Err(e) => warn!("Warmup request {} failed for {}: {}", i, path, e),
        }
        pause(WARMUP_SPACING_SECS).await;
    }
}

pub(super) async fn concurrent_requests(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let executor = ParallelExecutor::new(CONCURRENT_WORKERS);
    let mut details = Map::new();
    let mut failures = Vec::new();

    for endpoint in TestEndpoint::all() {
        let path = endpoint.path();
        let threshold = PerformanceThreshold::for_endpoint(endpoint);

        if threshold.warmup_requests > 0 {
            warm_up(ctx, &path, &token, threshold.warmup_requests).await;
        }

        let outcomes = executor
            .fire(
                &ctx.client,
                &path,
                Some(&token),
                CONCURRENT_REQUESTS,
                Some(&ctx.results),
            )
            .await;
        let metrics = ParallelExecutor::metrics(&outcomes);

        let ok_times: Vec<f64> = outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.elapsed)
            .collect();
        let avg = metrics.latency.mean;
        let p95 = p95_latency(&ok_times);
        let success_rate = metrics.success_rate();

        info!(
            "{}: {}/{} ok ({:.1}%), avg={:.3}s p95={:.3}s",
            path,
            metrics.successful_requests,
            metrics.total_requests,
            success_rate * 100.0,
            avg,
            p95
        );

        // latency is only judged when something succeeded
        let violations: Vec<String> = if ok_times.is_empty() {
            threshold.violations(0.0, 0.0, success_rate)
        } else {
            threshold.violations(avg, p95, success_rate)
        };

        // no success at all fails even for endpoints with known issues
        if metrics.successful_requests == 0 {
            failures.push(format!(
                "{path}: no successful requests ({} sent)",
                metrics.total_requests
            ));
        } else if threshold.expected_failure {
            if !violations.is_empty() {
                info!("{} has known issues, monitoring only: {}", path, violations.join("; "));
            }
        } else if !violations.is_empty() {
            failures.push(format!("{path}: {}", violations.join("; ")));
        }

        details.insert(
            path,
            json!({
                "total": metrics.total_requests,
                "successful": metrics.successful_requests,
                "success_rate": success_rate,
                "avg": avg,
                "p95": p95,
                "expected_failure": threshold.expected_failure,
                "violations": violations,
            }),
        );
    }

    verify!(failures.is_empty(), "{}", failures.join(" | "));
    Ok(ProbeOutcome::new(format!(
        "{CONCURRENT_REQUESTS} requests on {CONCURRENT_WORKERS} workers per endpoint within thresholds"
    ))
    .with_details(Value::Object(details)))
}

pub(super) async fn latency_thresholds(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let mut details = Map::new();
    let mut critical = Vec::new();

    for endpoint in TestEndpoint::all() {
        let path = endpoint.path();
        let threshold = LatencyThreshold::for_endpoint(endpoint);

        if threshold.needs_warmup {
            let requests = PerformanceThreshold::for_endpoint(endpoint).warmup_requests;
            warm_up(ctx, &path, &token, requests).await;
        }

        let response = match ctx.get_recorded(&path, &token).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Request failed for {}: {}", path, e);
                critical.push(format!("{path}: {e}"));
                details.insert(path, json!({ "error": e.to_string() }));
                continue;
            }
        };

        let elapsed = response.elapsed_secs();
        let grade = threshold.grade(elapsed);
        log_metric(&format!("latency{}", path.replace('/', "_")), format!("{elapsed:.3}"), "s");

        match grade {
            LatencyGrade::Good | LatencyGrade::Acceptable => {
                info!("{}: {:.3}s {}", path, elapsed, grade.label())
            }
            LatencyGrade::Slow => warn!("{}: {:.3}s {}", path, elapsed, grade.label()),
            LatencyGrade::Critical => {
                warn!(
                    "{}: {:.3}s exceeds critical threshold {}s",
                    path, elapsed, threshold.slow
                );
                critical.push(format!(
                    "{path}: {elapsed:.3}s exceeds {}s",
                    threshold.slow
                ));
            }
        }

        details.insert(
            path,
            json!({
                "status": response.status_code,
                "latency": elapsed,
                "grade": grade,
            }),
        );
    }

    verify!(critical.is_empty(), "{}", critical.join(" | "));
    Ok(ProbeOutcome::new("no endpoint above its critical latency").with_details(Value::Object(details)))
}

pub(super) async fn burst_load(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let path = TestEndpoint::One.path();

    let outcomes = ParallelExecutor::new(BURST_WORKERS)
        .fire(&ctx.client, &path, Some(&token), BURST_REQUESTS, Some(&ctx.results))
        .await;
    let metrics = ParallelExecutor::metrics(&outcomes);

    let first_429 = outcomes
        .iter()
        .find(|o| o.status_code == Some(429))
        .map(|o| o.index + 1);

    log_metric("burst_success_rate", format!("{:.1}", metrics.success_rate() * 100.0), "%");
    log_metric("burst_throughput", format!("{:.1}", metrics.requests_per_sec()), "req/s");
    if let Some(at) = first_429 {
        info!("First 429 at request #{}", at);
    }

    verify!(
        metrics.errors.total() < metrics.total_requests,
        "All {} requests to {} failed without a response",
        metrics.total_requests,
        path
    );

    let mut message = format!(
        "{}/{} ok ({:.1}%)",
        metrics.successful_requests,
        metrics.total_requests,
        metrics.success_rate() * 100.0
    );
    if let Some(at) = first_429 {
        message.push_str(&format!(", first 429 at request #{at}"));
    }
    Ok(ProbeOutcome::new(message).with_details(json!({
        "latency": metrics.latency,
        "errors": metrics.errors,
        "first_429": first_429,
    })))
}
