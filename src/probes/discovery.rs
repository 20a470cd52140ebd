//! Discovery probes (10-23)
//!
//! These pin down the undocumented behavior of the test endpoints:
//! - endpoint 3 is cold until endpoint 1 has been called, boots in 7-11s and
//!   then serves 14 requests before answering 503; calling endpoint 1 again
//!   does not lift that limit
//! - endpoint 4 answers 429 after 4 quick successes and needs a cooldown
//! - endpoint 5 holds every response for 4.0-4.5s

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use anyhow::Result;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::{
    check_envelope, json_body, pause, ProbeContext, ProbeFailure, ProbeOutcome, ProbeSkipped,
};
use crate::benchmark::{median, outliers, LatencyStats};
use crate::http::HttpRequest;
use crate::models::TestEndpoint;
use crate::results::{PatternAnalysis, SweepRecord, SweepRun};
use crate::utils::logger::{log_api_request, log_metric};

/// Sweep runs: (endpoint, requests, base delay, increasing delay)
pub const SWEEP_MATRIX: [SweepRun; 27] = [
    // single request
    SweepRun::new(1, 1, 0.0, false),
    SweepRun::new(2, 1, 0.0, false),
    SweepRun::new(3, 1, 0.0, false),
    SweepRun::new(4, 1, 0.0, false),
    SweepRun::new(5, 1, 0.0, false),
    SweepRun::new(6, 1, 0.0, false),
    // rapid fire
    SweepRun::new(1, 10, 0.0, false),
    SweepRun::new(2, 10, 0.0, false),
    SweepRun::new(3, 10, 0.0, false),
    SweepRun::new(4, 30, 0.0, false),
    SweepRun::new(5, 10, 0.0, false),
    SweepRun::new(6, 10, 0.0, false),
    // fixed 1s delay
    SweepRun::new(1, 10, 1.0, false),
    SweepRun::new(3, 10, 1.0, false),
    SweepRun::new(4, 20, 1.0, false),
    SweepRun::new(5, 10, 1.0, false),
    SweepRun::new(6, 10, 1.0, false),
    // delay grows by half each request
    SweepRun::new(1, 10, 0.5, true),
    SweepRun::new(3, 10, 0.5, true),
    SweepRun::new(4, 10, 0.5, true),
    SweepRun::new(5, 10, 0.5, true),
    SweepRun::new(6, 10, 0.5, true),
    // long running
    SweepRun::new(1, 20, 0.5, false),
    SweepRun::new(3, 20, 0.5, false),
    SweepRun::new(4, 20, 1.0, false),
    SweepRun::new(5, 20, 0.5, false),
    SweepRun::new(6, 20, 1.0, false),
];

const DELAY_GROWTH: f64 = 1.5;
const BODY_PREVIEW_CHARS: usize = 100;

const EP3_RECOVERY_MIN_SECS: f64 = 7.0;
const EP3_RECOVERY_MAX_SECS: f64 = 11.0;
const EP3_RECOVERY_POLLS: usize = 20;
const EP3_BOOT_SECS: f64 = 10.0;
const EP3_COLD_BOOT_SECS: f64 = 8.0;
const EP3_RATE_LIMIT: usize = 14;
const EP3_MAX_REQUESTS: usize = 20;
const EP3_COLD_IDLE_SECS: f64 = 40.0;
const WARMUP_CYCLES: usize = 3;

const EP4_RATE_LIMIT: usize = 4;
const EP4_MAX_REQUESTS: usize = 15;
const EP4_TRIGGER_REQUESTS: usize = 20;
const EP4_SPACING_SECS: f64 = 0.1;
const EP4_SETTLE_SECS: f64 = 20.0;
const COOLDOWN_WAITS: [u64; 6] = [30, 40, 50, 60, 120, 300];

const EP5_CALLS: usize = 5;
const EP5_MIN_DELAY: f64 = 4.0;
const EP5_MAX_DELAY: f64 = 4.5;
const EP5_MAX_SPREAD: f64 = 0.5;

const CONSISTENCY_REQUESTS: usize = 15;
const OUTLIER_FACTOR: f64 = 2.0;
const ROUTING_REQUESTS: usize = 10;
const CALL_SEQUENCES: [&[u8]; 4] = [&[1, 3, 4], &[1, 2, 3], &[3, 4, 5], &[1, 4, 5, 6]];
const HTTP_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

/// Status codes a single cold request may legitimately return
const SINGLE_REQUEST_STATUSES: [u16; 3] = [200, 500, 503];

/// Issue one sweep run, sleeping between requests as configured
pub(crate) async fn run_sweep(
    ctx: &ProbeContext,
    run: &SweepRun,
    token: &str,
) -> Result<Vec<SweepRecord>> {
    let path = format!("/api/test/{}", run.endpoint);
    let mut records = Vec::with_capacity(run.requests);
    let mut current_delay = run.delay;
    let mut error_count = 0;
    let mut recovered_once = false;

    for i in 0..run.requests {
        if i > 0 && current_delay > 0.0 {
            pause(current_delay).await;
            if run.increasing {
                current_delay *= DELAY_GROWTH;
            }
        }

        let response = ctx.get(&path, Some(token)).await?;
        let body = response
            .json_value()
            .map(|v| v.to_string())
            .unwrap_or_else(|| response.body.chars().take(BODY_PREVIEW_CHARS).collect());

        let recovered = response.status_code == 200 && !recovered_once && error_count > 0;
        if recovered {
            recovered_once = true;
        }
        if response.status_code != 200 {
            error_count += 1;
        }

        records.push(SweepRecord {
            request_num: i + 1,
            status_code: response.status_code,
            response_time: response.elapsed_secs(),
            delay_before: if i > 0 { current_delay } else { 0.0 },
            body,
            recovered,
        });
    }

    Ok(records)
}

pub(super) async fn endpoint_sweep(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let report = ctx.report().await?;
    info!("Writing discovery report to {}", report.path().display());

    let mut findings = Vec::new();
    for run in &SWEEP_MATRIX {
        let token = ctx.tokens.fresh_token().await?;
        let records = run_sweep(ctx, run, &token).await?;
        report.write_run(run, &records)?;

        let analysis = PatternAnalysis::from_records(&records);
        let codes: Vec<u16> = records.iter().map(|r| r.status_code).collect();
        info!(
            "Endpoint {} ({} requests, delay {}s, increasing {}): {:?}",
            run.endpoint, run.requests, run.delay, run.increasing, codes
        );
        if let Some(at) = analysis.warmup_at {
            info!("  Recovered at request #{}", at);
        }

        if run.requests == 1 {
            let status = codes.first().copied().unwrap_or_default();
            verify!(
                SINGLE_REQUEST_STATUSES.contains(&status),
                "Unexpected status code {} from /api/test/{}",
                status,
                run.endpoint
            );
        } else {
            verify!(
                records.len() == run.requests,
                "Not all requests completed for /api/test/{}",
                run.endpoint
            );
        }

        findings.push(json!({
            "endpoint": run.endpoint,
            "requests": run.requests,
            "delay": run.delay,
            "increasing": run.increasing,
            "distribution": analysis.distribution,
            "warmup_at": analysis.warmup_at,
            "throttled": analysis.throttled,
        }));
    }

    Ok(ProbeOutcome::new(format!(
        "{} runs written to {}",
        SWEEP_MATRIX.len(),
        report.path().display()
    ))
    .with_details(Value::from(findings)))
}

/// Poll a cold EP3 once a second; seconds since `start` and requests used once it answers 200
async fn await_ep3_ready(
    ctx: &ProbeContext,
    token: &str,
    start: Instant,
) -> Result<Option<(f64, usize)>> {
    let ep3 = TestEndpoint::Three.path();

    for attempt in 2..=EP3_RECOVERY_POLLS {
        pause(1.0).await;
        let response = ctx.get_observed(&ep3, token).await?;
        log_api_request(attempt, "GET", &ep3, response.status_code, response.elapsed_secs());

        if response.status_code == 200 {
            return Ok(Some((start.elapsed().as_secs_f64(), attempt)));
        }
    }
    Ok(None)
}

pub(super) async fn warmup_recovery(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let ep1 = TestEndpoint::One.path();
    let ep3 = TestEndpoint::Three.path();

    let warmup = ctx.get_recorded(&ep1, &token).await?;
    verify!(
        warmup.status_code == 200,
        "EP1 warmup failed: {}",
        warmup.status_code
    );

    let start = Instant::now();
    let first = ctx.get_observed(&ep3, &token).await?;
    if first.status_code == 200 {
        return Err(ProbeSkipped::new("EP3 already warm, cold start not observable").into());
    }
    verify!(
        first.status_code == 503,
        "Expected 503 from cold EP3, got {}",
        first.status_code
    );

    let Some((elapsed, attempts)) = await_ep3_ready(ctx, &token, start).await? else {
        return Err(ProbeFailure::new(format!(
            "EP3 did not recover within {EP3_RECOVERY_POLLS} requests"
        ))
        .into());
    };

    log_metric("ep3_recovery_time", format!("{elapsed:.1}"), "s");
    verify!(
        (EP3_RECOVERY_MIN_SECS..=EP3_RECOVERY_MAX_SECS).contains(&elapsed),
        "EP3 recovered after {:.1}s, expected {}-{}s",
        elapsed,
        EP3_RECOVERY_MIN_SECS,
        EP3_RECOVERY_MAX_SECS
    );
    Ok(ProbeOutcome::new(format!(
        "EP3 recovered after {elapsed:.1}s ({attempts} requests)"
    )))
}

pub(super) async fn warmup_cycles(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    run_warmup_cycles(ctx, &token, EP3_COLD_IDLE_SECS).await
}

/// Idle until EP3 goes cold, warm it through EP1, repeat
async fn run_warmup_cycles(ctx: &ProbeContext, token: &str, idle_secs: f64) -> Result<ProbeOutcome> {
    let ep1 = TestEndpoint::One.path();
    let ep3 = TestEndpoint::Three.path();
    let mut cycles = Vec::with_capacity(WARMUP_CYCLES);
    let mut stuck = Vec::new();

    for cycle in 1..=WARMUP_CYCLES {
        info!("Cycle {}: idling {}s so EP3 goes cold...", cycle, idle_secs);
        pause(idle_secs).await;

        let warmup = ctx.get_recorded(&ep1, token).await?;
        verify!(
            warmup.status_code == 200,
            "Cycle {}: EP1 warmup failed: {}",
            cycle,
            warmup.status_code
        );

        let start = Instant::now();
        let first = ctx.get_observed(&ep3, token).await?;
        let ready_after = if first.status_code == 200 {
            Some(0.0)
        } else {
            await_ep3_ready(ctx, token, start).await?.map(|(secs, _)| secs)
        };

        match ready_after {
            Some(secs) => info!(
                "Cycle {}: EP3 first answered {}, ready after {:.1}s",
                cycle, first.status_code, secs
            ),
            None => {
                warn!("Cycle {}: EP3 never answered 200", cycle);
                stuck.push(cycle);
            }
        }
        cycles.push(json!({
            "cycle": cycle,
            "first_status": first.status_code,
            "ready_after": ready_after,
        }));
    }

    verify!(
        stuck.is_empty(),
        "EP3 did not warm up in cycle(s) {:?}",
        stuck
    );
    Ok(ProbeOutcome::new(format!("EP3 warmed up in all {WARMUP_CYCLES} cycles"))
        .with_details(Value::from(cycles)))
}

pub(super) async fn warmup_rate_limit(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let ep1 = TestEndpoint::One.path();
    let ep3 = TestEndpoint::Three.path();

    ctx.get_recorded(&ep1, &token).await?;
    pause(EP3_BOOT_SECS).await;

    let mut successes = 0;
    let mut limited_at = None;
    for i in 1..=EP3_MAX_REQUESTS {
        let response = ctx.get_observed(&ep3, &token).await?;
        log_api_request(i, "GET", &ep3, response.status_code, response.elapsed_secs());

        match response.status_code {
            200 => successes += 1,
            503 => {
                limited_at = Some(i);
                break;
            }
            _ => {}
        }
        pause(1.0).await;
    }

    info!("Successful requests before rate limit: {}", successes);
    verify!(
        successes == EP3_RATE_LIMIT,
        "Expected {} successful requests, got {}",
        EP3_RATE_LIMIT,
        successes
    );

    Ok(ProbeOutcome::new(format!(
        "{successes} successes, 503 at request {}",
        limited_at.map_or_else(|| "none".to_string(), |i| i.to_string())
    )))
}

pub(super) async fn rate_limit_persistence(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    check_limit_survives_ep1(ctx, &token, EP3_BOOT_SECS, 1.0).await
}

/// Drive EP3 into its rate limit, call EP1, and expect EP3 to stay limited
async fn check_limit_survives_ep1(
    ctx: &ProbeContext,
    token: &str,
    boot_secs: f64,
    spacing_secs: f64,
) -> Result<ProbeOutcome> {
    let ep1 = TestEndpoint::One.path();
    let ep3 = TestEndpoint::Three.path();

    ctx.get_recorded(&ep1, token).await?;
    pause(boot_secs).await;

    let mut limited_at = None;
    for i in 1..=EP3_MAX_REQUESTS {
        let response = ctx.get_observed(&ep3, token).await?;
        log_api_request(i, "GET", &ep3, response.status_code, response.elapsed_secs());
        if response.status_code == 503 {
            limited_at = Some(i);
            break;
        }
        pause(spacing_secs).await;
    }
    let Some(limited_at) = limited_at else {
        return Err(ProbeFailure::new(format!(
            "EP3 never answered 503 within {EP3_MAX_REQUESTS} requests"
        ))
        .into());
    };
    info!("EP3 rate limited at request {}, calling EP1...", limited_at);

    let reset = ctx.get_recorded(&ep1, token).await?;
    verify!(
        reset.status_code == 200,
        "EP1 returned {} while EP3 was rate limited",
        reset.status_code
    );

    let after = ctx.get_observed(&ep3, token).await?;
    verify!(
        after.status_code == 503,
        "EP1 reset the EP3 rate limit: EP3 answered {}",
        after.status_code
    );

    Ok(ProbeOutcome::new(format!(
        "EP3 still 503 after an EP1 call (limited at request {limited_at})"
    )))
}

/// Call EP4 until it answers 429; returns (successes before 429, limited)
async fn trigger_ep4_limit(
    ctx: &ProbeContext,
    token: &str,
    max_requests: usize,
    check_body: bool,
) -> Result<(usize, bool)> {
    let ep4 = TestEndpoint::Four.path();
    let mut successes = 0;

    for i in 1..=max_requests {
        let response = ctx.get_observed(&ep4, token).await?;
        log_api_request(i, "GET", &ep4, response.status_code, response.elapsed_secs());

        match response.status_code {
            200 => successes += 1,
            429 => {
                info!("Rate limit hit after {} requests", i);
                if let Some(retry_after) = response.get_header("retry-after") {
                    info!("Retry-After header: {}", retry_after);
                }
                if check_body {
                    let body = json_body(&response)?;
                    check_envelope(&body, "error")?;
                }
                return Ok((successes, true));
            }
            other => warn!("Unexpected status from {}: {}", ep4, other),
        }
        pause(EP4_SPACING_SECS).await;
    }

    Ok((successes, false))
}

pub(super) async fn burst_rate_limit(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;

    let (successes, limited) = trigger_ep4_limit(ctx, &token, EP4_MAX_REQUESTS, true).await?;
    verify!(limited, "Expected to hit rate limit (429) but didn't");
    verify!(
        successes == EP4_RATE_LIMIT,
        "Expected {} successful requests before 429, got {}",
        EP4_RATE_LIMIT,
        successes
    );

    Ok(ProbeOutcome::new(format!(
        "429 after {successes} successful requests"
    )))
}

pub(super) async fn cooldown_window(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let ep4 = TestEndpoint::Four.path();

    let (_, limited) = trigger_ep4_limit(ctx, &token, EP4_TRIGGER_REQUESTS, false).await?;
    verify!(limited, "Failed to trigger rate limit in initial requests");

    for wait in COOLDOWN_WAITS {
        info!("Waiting {}s for potential cooldown...", wait);
        pause(wait as f64).await;

        let response = ctx.get_observed(&ep4, &token).await?;
        info!("After {}s wait: Status {}", wait, response.status_code);

        match response.status_code {
            200 => {
                let mut consecutive = 1;
                for _ in 0..EP4_RATE_LIMIT {
                    if ctx.get_observed(&ep4, &token).await?.status_code == 200 {
                        consecutive += 1;
                    }
                    pause(EP4_SPACING_SECS).await;
                }
                info!(
                    "Made {} consecutive successful requests after cooldown",
                    consecutive
                );
                return Ok(ProbeOutcome::new(format!(
                    "cooldown period is at most {wait}s"
                ))
                .with_details(json!({ "cooldown_secs": wait, "consecutive": consecutive })));
            }
            429 => info!("Still rate limited after {}s", wait),
            other => warn!("Unexpected status: {}", other),
        }
    }

    let longest = COOLDOWN_WAITS[COOLDOWN_WAITS.len() - 1];
    Err(ProbeFailure::new(format!(
        "Cooldown period exceeds {longest}s, rate limit not reset"
    ))
    .into())
}

pub(super) async fn rate_limit_isolation(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let ep3 = TestEndpoint::Three.path();
    let ep4 = TestEndpoint::Four.path();

    pause(EP4_SETTLE_SECS).await;

    let mut warmup = ctx.get_observed(&ep3, &token).await?;
    if warmup.status_code == 503 {
        info!("EP3 cold, waiting {}s for backend boot...", EP3_COLD_BOOT_SECS);
        pause(EP3_COLD_BOOT_SECS).await;
        warmup = ctx.get_observed(&ep3, &token).await?;
    }
    verify!(
        warmup.status_code == 200,
        "EP3 not ready after cold start: {}",
        warmup.status_code
    );

    for _ in 0..=EP4_RATE_LIMIT {
        ctx.get_observed(&ep4, &token).await?;
        pause(EP4_SPACING_SECS).await;
    }

    let ep4_response = ctx.get_observed(&ep4, &token).await?;
    verify!(
        ep4_response.status_code == 429,
        "Expected EP4 429, got {}",
        ep4_response.status_code
    );

    let ep3_response = ctx.get_observed(&ep3, &token).await?;
    verify!(
        ep3_response.status_code == 200,
        "EP3 should not be affected by EP4 rate limit, got {}",
        ep3_response.status_code
    );

    Ok(ProbeOutcome::new("EP3 unaffected by EP4 rate limit"))
}

pub(super) async fn fixed_delay(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let ep5 = TestEndpoint::Five.path();
    let mut latencies = Vec::with_capacity(EP5_CALLS);

    for i in 1..=EP5_CALLS {
        let response = ctx.get_recorded(&ep5, &token).await?;
        let latency = response.elapsed_secs();
        log_api_request(i, "GET", &ep5, response.status_code, latency);

        verify!(
            response.status_code == 200,
            "EP5 returned {}",
            response.status_code
        );
        verify!(
            (EP5_MIN_DELAY..=EP5_MAX_DELAY).contains(&latency),
            "EP5 latency {:.2}s outside {}-{}s",
            latency,
            EP5_MIN_DELAY,
            EP5_MAX_DELAY
        );
        latencies.push(latency);
    }

    let stats = LatencyStats::from_samples(&latencies);
    verify!(
        stats.spread() < EP5_MAX_SPREAD,
        "EP5 latency spread {:.2}s exceeds {}s",
        stats.spread(),
        EP5_MAX_SPREAD
    );

    Ok(ProbeOutcome::new(stats.format_summary()))
}

pub(super) async fn response_time_consistency(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let mut details = Map::new();

    for endpoint in TestEndpoint::all() {
        let path = endpoint.path();
        let mut times = Vec::with_capacity(CONSISTENCY_REQUESTS);

        for _ in 0..CONSISTENCY_REQUESTS {
            let response = ctx.get_recorded(&path, &token).await?;
            times.push(response.elapsed_secs());
            pause(0.2).await;
        }

        let stats = LatencyStats::from_samples(&times);
        let slow = outliers(&times, OUTLIER_FACTOR);
        info!(
            "{}: min={:.3}s, max={:.3}s, median={:.3}s",
            path,
            stats.min,
            stats.max,
            median(&times)
        );
        if !slow.is_empty() {
            warn!("{}: detected {} outliers: {:?}", path, slow.len(), slow);
        }

        details.insert(
            path,
            json!({ "stats": stats, "outliers": slow }),
        );
    }

    Ok(ProbeOutcome::new(format!(
        "{CONSISTENCY_REQUESTS} requests per endpoint"
    ))
    .with_details(Value::Object(details)))
}

pub(super) async fn redirect_detection(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let mut redirects = Vec::new();

    for endpoint in TestEndpoint::all() {
        let path = endpoint.path();
        let request = HttpRequest::get(path.as_str()).bearer(&token).no_redirect();

        let response = match ctx.client.send(request).await {
            Ok(response) => response,
            Err(e) => {
                ctx.results.record_error(&path);
                return Err(e);
            }
        };
        ctx.results
            .record_response(&path, response.status_code, response.elapsed_secs());

        if response.is_redirect() {
            let location = response
                .get_header("location")
                .cloned()
                .unwrap_or_default();
            warn!("Redirect detected: {} → {}", response.status_code, location);
            redirects.push(format!("{path} → {} {location}", response.status_code));
        }
    }

    verify!(
        redirects.is_empty(),
        "Redirects detected: {}",
        redirects.join(", ")
    );
    Ok(ProbeOutcome::new("no redirects"))
}

pub(super) async fn server_routing(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let mut details = Map::new();
    let mut inconsistent = Vec::new();

    for endpoint in TestEndpoint::all() {
        let path = endpoint.path();
        let mut servers = BTreeSet::new();

        for _ in 0..ROUTING_REQUESTS {
            let response = ctx.get_recorded(&path, &token).await?;
            servers.insert(
                response
                    .get_header("server")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
            );
            pause(0.1).await;
        }

        if servers.len() > 1 {
            warn!("Multiple servers detected for {}: {:?}", path, servers);
            inconsistent.push(path.clone());
        } else {
            info!("Consistent routing for {}: {:?}", path, servers);
        }
        details.insert(path, json!(servers));
    }

    let message = if inconsistent.is_empty() {
        "consistent routing on all endpoints".to_string()
    } else {
        format!("multiple servers behind {}", inconsistent.join(", "))
    };
    Ok(ProbeOutcome::new(message).with_details(Value::Object(details)))
}

pub(super) async fn call_sequence(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let mut details = Map::new();
    let mut unlocked = Vec::new();

    for endpoint in TestEndpoint::all() {
        let target = endpoint.path();
        let mut outcomes = Vec::new();

        for sequence in CALL_SEQUENCES {
            let token = ctx.tokens.fresh_token().await?;
            let rendered: Vec<String> = sequence.iter().map(u8::to_string).collect();
            info!("Testing {} after sequence: {}", target, rendered.join(" → "));

            for n in sequence {
                let path = format!("/api/test/{n}");
                let response = ctx.get(&path, Some(token.as_str())).await?;
                info!("  Called {}: {}", path, response.status_code);
                pause(0.3).await;
            }

            let response = ctx.get_recorded(&target, &token).await?;
            if response.status_code == 200 {
                warn!("{} succeeded after sequence {:?}", target, sequence);
                unlocked.push(format!("{target} after {}", rendered.join("→")));
            }
            outcomes.push(json!({
                "sequence": sequence,
                "status": response.status_code,
            }));
        }

        details.insert(target, Value::from(outcomes));
    }

    Ok(ProbeOutcome::new(format!(
        "{} sequence/target pairs answered 200",
        unlocked.len()
    ))
    .with_details(Value::Object(details)))
}

pub(super) async fn http_methods(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let ep1 = TestEndpoint::One.path();
    let mut statuses = BTreeMap::new();

    for method in HTTP_METHODS {
        let request = HttpRequest::new(method, ep1.as_str()).bearer(&token);
        let response = ctx.client.send(request).await?;
        info!("{}: {}", method, response.status_code);
        statuses.insert(method.to_string(), response.status_code);
    }

    let get = statuses.get("GET").copied().unwrap_or_default();
    verify!(get == 200, "GET {} returned {}", ep1, get);

    let rendered: Vec<String> = statuses.iter().map(|(m, s)| format!("{m}={s}")).collect();
    Ok(ProbeOutcome::new(rendered.join(" ")).with_details(json!(statuses)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::testing;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_sweep_matrix_shape() {
        assert_eq!(SWEEP_MATRIX.iter().filter(|r| r.requests == 1).count(), 6);
        assert!(SWEEP_MATRIX.iter().all(|r| (1..=6).contains(&r.endpoint)));
        assert_eq!(SWEEP_MATRIX.iter().filter(|r| r.increasing).count(), 5);
    }

    #[tokio::test]
    async fn test_ep4_rate_limit_after_four() {
        let server = MockServer::start().await;
        testing::mount_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/test/4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(testing::success_envelope()))
            .up_to_n_times(4)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/test/4"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(testing::error_envelope("Too many")),
            )
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let outcome = burst_rate_limit(&ctx).await.unwrap();
        assert_eq!(outcome.message.unwrap(), "429 after 4 successful requests");

        // observations only: no pass/fail counts
        let result = ctx.results.get("/api/test/4").unwrap();
        assert_eq!(result.status_codes, vec![200, 200, 200, 200, 429]);
        assert_eq!(result.passed, 0);
        assert_eq!(result.failed, 0);
    }

    #[tokio::test]
    async fn test_ep4_without_rate_limit_fails() {
        let server = MockServer::start().await;
        testing::mount_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/test/4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(testing::success_envelope()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let err = burst_rate_limit(&ctx).await.unwrap_err();
        let failure = err.downcast_ref::<ProbeFailure>().unwrap();
        assert_eq!(failure.message(), "Expected to hit rate limit (429) but didn't");
        assert_eq!(ctx.results.get("/api/test/4").unwrap().test_count, 15);
    }

    #[tokio::test]
    async fn test_run_sweep_marks_recovery() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/test/3"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/test/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(testing::success_envelope()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let run = SweepRun::new(3, 4, 0.0, false);
        let records = run_sweep(&ctx, &run, "token").await.unwrap();

        let codes: Vec<u16> = records.iter().map(|r| r.status_code).collect();
        assert_eq!(codes, vec![503, 503, 200, 200]);
        assert!(records[2].recovered);
        assert!(!records[3].recovered);
        assert_eq!(records[0].body, "Service Unavailable");
        assert!(records[2].body.contains("\"status\":\"success\""));
        assert_eq!(PatternAnalysis::from_records(&records).warmup_at, Some(3));
    }

    #[tokio::test]
    async fn test_http_methods() {
        let server = MockServer::start().await;
        testing::mount_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/test/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(testing::success_envelope()))
            .mount(&server)
            .await;
        Mock::given(path("/api/test/1"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let outcome = http_methods(&ctx).await.unwrap();
        let details = outcome.details.unwrap();
        assert_eq!(details["GET"], json!(200));
        assert_eq!(details["DELETE"], json!(405));
        assert_eq!(details.as_object().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_redirect_detection() {
        let server = MockServer::start().await;
        testing::mount_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/test/5"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", "https://elsewhere.test/"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(testing::success_envelope()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let err = redirect_detection(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("/api/test/5 → 302 https://elsewhere.test/"));
        assert_eq!(ctx.results.get("/api/test/5").unwrap().failed, 1);
    }

    async fn mount_ep1(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/test/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(testing::success_envelope()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_warm_ep3_skips_recovery_check() {
        let server = MockServer::start().await;
        testing::mount_auth(&server).await;
        mount_ep1(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/test/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(testing::success_envelope()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let err = warmup_recovery(&ctx).await.unwrap_err();
        assert!(err.downcast_ref::<ProbeSkipped>().is_some());
        assert!(err.downcast_ref::<ProbeFailure>().is_none());
    }

    #[tokio::test]
    async fn test_warmup_cycles_track_cold_first_cycle() {
        let server = MockServer::start().await;
        mount_ep1(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/test/3"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/test/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(testing::success_envelope()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let outcome = run_warmup_cycles(&ctx, "token", 0.0).await.unwrap();
        assert_eq!(outcome.message.unwrap(), "EP3 warmed up in all 3 cycles");

        let cycles = outcome.details.unwrap();
        assert_eq!(cycles[0]["first_status"], json!(503));
        assert!(cycles[0]["ready_after"].as_f64().unwrap() >= 1.0);
        assert_eq!(cycles[1]["first_status"], json!(200));
        assert_eq!(cycles[2]["ready_after"], json!(0.0));
    }

    #[tokio::test]
    async fn test_ep1_does_not_reset_ep3_limit() {
        let server = MockServer::start().await;
        mount_ep1(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/test/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(testing::success_envelope()))
            .up_to_n_times(14)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/test/3"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let outcome = check_limit_survives_ep1(&ctx, "token", 0.0, 0.0).await.unwrap();
        assert_eq!(
            outcome.message.unwrap(),
            "EP3 still 503 after an EP1 call (limited at request 15)"
        );
        assert_eq!(ctx.results.get("/api/test/1").unwrap().passed, 2);
    }

    #[tokio::test]
    async fn test_ep1_resetting_ep3_limit_fails() {
        let server = MockServer::start().await;
        mount_ep1(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/test/3"))
            .respond_with(ResponseTemplate::new(200))
            .up_to_n_times(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/test/3"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/test/3"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let err = check_limit_survives_ep1(&ctx, "token", 0.0, 0.0).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProbeFailure>().unwrap().message(),
            "EP1 reset the EP3 rate limit: EP3 answered 200"
        );
    }
}
