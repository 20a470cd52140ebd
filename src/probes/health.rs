//! Health probes (1-2)

use anyhow::Result;
use serde_json::{json, Value};
use tracing::info;

use super::{json_body, ProbeContext, ProbeOutcome};
use crate::models::{HealthBody, HEALTH_ENDPOINT};
use crate::utils::logger::log_api_request;

const CONSISTENCY_CALLS: usize = 5;

/// One unauthenticated health call, checked for a healthy body
async fn check_health(ctx: &ProbeContext, request_num: usize) -> Result<f64> {
    let response = ctx.get(HEALTH_ENDPOINT, None).await?;
    log_api_request(
        request_num,
        "GET",
        HEALTH_ENDPOINT,
        response.status_code,
        response.elapsed_secs(),
    );

    verify!(
        response.status_code == 200,
        "Health check returned {}",
        response.status_code
    );

    let body = json_body(&response)?;
    verify!(
        body.get("status").is_some(),
        "Health response missing 'status' field"
    );
    verify!(
        body.get("timestamp").is_some(),
        "Health response missing 'timestamp' field"
    );

    let health: HealthBody = serde_json::from_value(body)?;
    verify!(
        health.is_healthy(),
        "Expected status 'healthy', got '{}'",
        health.status
    );

    Ok(response.elapsed_secs())
}

pub(super) async fn health_check(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let elapsed = check_health(ctx, 1).await?;
    info!("Service healthy ({:.3}s)", elapsed);
    Ok(ProbeOutcome::new(format!("healthy in {elapsed:.3}s")))
}

pub(super) async fn health_consistency(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let mut times = Vec::with_capacity(CONSISTENCY_CALLS);
    for i in 1..=CONSISTENCY_CALLS {
        times.push(check_health(ctx, i).await?);
    }

    let avg = times.iter().sum::<f64>() / times.len() as f64;
    Ok(
        ProbeOutcome::new(format!("{CONSISTENCY_CALLS}/{CONSISTENCY_CALLS} healthy, avg {avg:.3}s"))
            .with_details(json!({ "response_times": Value::from(times) })),
    )
}
