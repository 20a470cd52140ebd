//! Reliability probes (27-31)

use anyhow::Result;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{info, warn};

use super::{json_body, ProbeContext, ProbeOutcome};
use crate::executor::ParallelExecutor;
use crate::http::{HttpError, HttpRequest};
use crate::models::TestEndpoint;

const MAX_ATTEMPTS: usize = 3;
const SHORT_TIMEOUT: Duration = Duration::from_secs(1);
const DNS_TIMEOUT: Duration = Duration::from_secs(5);
const RECOVERY_REQUESTS: usize = 2;
const RESILIENCE_REQUESTS: usize = 5;
const UNRESOLVABLE_URL: &str = "https://this-domain-definitely-does-not-exist-12345.com/api/test/1";

pub(super) async fn retry_resilience(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let mut attempts_needed = Map::new();
    let mut exhausted = Vec::new();

    for endpoint in TestEndpoint::all() {
        let path = endpoint.path();
        let mut succeeded_on = None;
        let mut last = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            match ctx.get_recorded(&path, &token).await {
                Ok(response) if response.status_code == 200 => {
                    succeeded_on = Some(attempt);
                    break;
                }
                Ok(response) => last = response.status_code.to_string(),
                Err(e) => last = e.to_string(),
            }
            warn!("{} attempt {}/{} failed: {}", path, attempt, MAX_ATTEMPTS, last);
        }

        match succeeded_on {
            Some(attempt) => {
                info!("{} succeeded on attempt {}", path, attempt);
                attempts_needed.insert(path, json!(attempt));
            }
            None => {
                attempts_needed.insert(path.clone(), Value::Null);
                exhausted.push(format!("{path} (last: {last})"));
            }
        }
    }

    verify!(
        exhausted.is_empty(),
        "No 200 after {} attempts: {}",
        MAX_ATTEMPTS,
        exhausted.join(", ")
    );
    Ok(ProbeOutcome::new("every endpoint answered 200 within 3 attempts")
        .with_details(Value::Object(attempts_needed)))
}

pub(super) async fn timeout_enforcement(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let path = TestEndpoint::Five.path();

    let request = HttpRequest::get(path.as_str())
        .bearer(&token)
        .timeout(SHORT_TIMEOUT);

    match ctx.client.send(request).await {
        Ok(response) => Err(super::ProbeFailure::new(format!(
            "{} answered {} in {:.3}s despite a {}s client timeout",
            path,
            response.status_code,
            response.elapsed_secs(),
            SHORT_TIMEOUT.as_secs()
        ))
        .into()),
        Err(e) => {
            verify!(
                HttpError::is_timeout(&e),
                "Expected a client timeout, got: {}",
                e
            );
            Ok(ProbeOutcome::new(format!("{path} timed out after {}s", SHORT_TIMEOUT.as_secs())))
        }
    }
}

pub(super) async fn dns_failure(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let request = HttpRequest::get(UNRESOLVABLE_URL).timeout(DNS_TIMEOUT);

    match ctx.client.send(request).await {
        Ok(response) => Err(super::ProbeFailure::new(format!(
            "Unresolvable host answered {}",
            response.status_code
        ))
        .into()),
        Err(e) => {
            info!("DNS failure surfaced as: {}", e);
            Ok(ProbeOutcome::new(format!("request failed as expected: {e}")))
        }
    }
}

/// EP6 keeps answering 200 with a JSON body on back-to-back requests
pub(super) async fn endpoint_recovery(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let path = TestEndpoint::Six.path();

    for i in 1..=RECOVERY_REQUESTS {
        let response = ctx.get_recorded(&path, &token).await?;
        verify!(
            response.status_code == 200,
            "Request {} to {}: expected 200, got {}",
            i,
            path,
            response.status_code
        );
        json_body(&response)?;
    }

    Ok(ProbeOutcome::new(format!(
        "{path} answered {RECOVERY_REQUESTS} consecutive requests"
    )))
}

pub(super) async fn concurrent_resilience(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let path = TestEndpoint::Six.path();

    let outcomes = ParallelExecutor::new(RESILIENCE_REQUESTS)
        .fire(
            &ctx.client,
            &path,
            Some(&token),
            RESILIENCE_REQUESTS,
            Some(&ctx.results),
        )
        .await;
    let statuses: Vec<Option<u16>> = outcomes.iter().map(|o| o.status_code).collect();
    info!("Status codes: {:?}", statuses);

    verify!(
        outcomes.iter().all(|o| o.is_success()),
        "Not all concurrent requests to {} succeeded: {:?}",
        path,
        statuses
    );
    Ok(ProbeOutcome::new(format!(
        "{RESILIENCE_REQUESTS} concurrent requests to {path} answered 200"
    )))
}
