//! Probe session runner
//!
//! Runs the selected probes one after another against a shared context and
//! classifies each outcome.

#![allow(dead_code)]

use std::time::Instant;
use tracing::{error, info, warn};

use crate::auth::AuthError;
use crate::models::{ProbeCase, ProbeResult, ProbeStatus, SessionSummary};
use crate::probes::{run_probe, ProbeContext, ProbeFailure, ProbeSkipped};
use crate::utils::logger::{log_test_end, log_test_start};

/// Sequential probe runner
pub struct ProbeRunner {
    ctx: ProbeContext,
    include_slow: bool,
}

impl ProbeRunner {
    pub fn new(ctx: ProbeContext) -> Self {
        Self {
            ctx,
            include_slow: false,
        }
    }

    /// Also run probes that sleep for long stretches
    pub fn include_slow(mut self, include: bool) -> Self {
        self.include_slow = include;
        self
    }

    pub fn context(&self) -> &ProbeContext {
        &self.ctx
    }

    /// Run a single probe
    pub async fn run_probe(&self, probe: ProbeCase) -> ProbeResult {
        if probe.is_slow() && !self.include_slow {
            return ProbeResult::skip(probe, "Slow probe, use --include-slow");
        }

        log_test_start(
            probe.name(),
            &[
                ("number", probe.number().to_string()),
                ("category", probe.category().to_string()),
            ],
        );

        let start = Instant::now();
        let outcome = run_probe(probe, &self.ctx).await;
        let elapsed = start.elapsed();
        let duration_ms = elapsed.as_millis() as u64;

        let result = match outcome {
            Ok(outcome) => {
                let mut result = ProbeResult::pass(probe, duration_ms);
                if let Some(issue) = probe.known_issue() {
                    info!("{} passed; known issue appears fixed: {}", probe, issue);
                    result = result.with_message(format!("Known issue no longer reproduces: {issue}"));
                } else if let Some(message) = outcome.message {
                    result = result.with_message(message);
                }
                match outcome.details {
                    Some(details) => result.with_details(details),
                    None => result,
                }
            }
            Err(e) => classify_error(probe, duration_ms, e),
        };

        let passed = matches!(result.status, ProbeStatus::Pass | ProbeStatus::XFail);
        log_test_end(probe.name(), passed, elapsed.as_secs_f64());
        result
    }

    /// Run probes in order and summarize the session
    pub async fn run(&self, probes: &[ProbeCase]) -> SessionSummary {
        info!(
            "Running {} probes against {}",
            probes.len(),
            self.ctx.config.base_url
        );

        let start = Instant::now();
        let mut results = Vec::with_capacity(probes.len());

        for &probe in probes {
            let result = self.run_probe(probe).await;
            info!("  {}", result);
            results.push(result);
        }

        let summary = SessionSummary::new(self.ctx.config.base_url.clone(), results);
        info!(
            "Session completed in {}ms - Pass: {}/{} ({:.1}%)",
            start.elapsed().as_millis(),
            summary.passed,
            summary.total,
            summary.pass_rate()
        );
        summary
    }

    /// Run every probe
    pub async fn run_all(&self) -> SessionSummary {
        self.run(&ProbeCase::all()).await
    }
}

fn classify_error(probe: ProbeCase, duration_ms: u64, err: anyhow::Error) -> ProbeResult {
    if let Some(failure) = err.downcast_ref::<ProbeFailure>() {
        return match probe.known_issue() {
            Some(issue) => {
                info!("{} failed as expected ({}): {}", probe, issue, failure);
                ProbeResult::xfail(probe, duration_ms, format!("{issue}: {failure}"))
            }
            None => {
                warn!("{} failed: {}", probe, failure);
                ProbeResult::fail(probe, duration_ms, failure.message())
            }
        };
    }

    let skipped = err.downcast_ref::<ProbeSkipped>().is_some()
        || matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::MissingRefreshToken)
        );
    if skipped {
        warn!("{} skipped: {}", probe, err);
        return ProbeResult::skip(probe, err.to_string());
    }

    error!("{} could not run: {:#}", probe, err);
    ProbeResult::error(probe, duration_ms, format!("{err:#}"))
}
