//! Security probes (32-39)

use anyhow::Result;
use serde_json::json;
use tracing::info;

use super::{pause, ProbeContext, ProbeOutcome};
use crate::executor::ParallelExecutor;
use crate::http::HttpRequest;
use crate::models::{TestEndpoint, AUTH_GENERATE_ENDPOINT, AUTH_REFRESH_ENDPOINT};

const DENIED: [u16; 2] = [401, 403];
const REJECTED: [u16; 3] = [400, 401, 403];
const MISSING_PARAMETER: [u16; 2] = [400, 401];
const MALFORMED_TOKENS: [&str; 3] = ["not_a_jwt", "", "invalid.token.format"];
const INVALID_REFRESH_TOKEN: &str = "invalid_refresh_token_xyz";
const DEFAULT_EXPIRES_IN: u64 = 900;
const EXPIRY_GRACE_SECS: u64 = 2;
const SHARED_TOKEN_REQUESTS: usize = 5;
const RAPID_REQUESTS: usize = 10;

pub(super) async fn unauthenticated_access(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let path = TestEndpoint::One.path();
    let response = ctx.get(&path, None).await?;

    verify!(
        DENIED.contains(&response.status_code),
        "Expected 401/403 without a token, got {}",
        response.status_code
    );
    Ok(ProbeOutcome::new(format!("denied with {}", response.status_code)))
}

pub(super) async fn invalid_tokens(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let path = TestEndpoint::One.path();
    let mut seen = Vec::new();

    for token in MALFORMED_TOKENS {
        let response = ctx.get(&path, Some(token)).await?;
        verify!(
            DENIED.contains(&response.status_code),
            "Token '{}' was not rejected: {}",
            token,
            response.status_code
        );
        seen.push(json!({ "token": token, "status": response.status_code }));
    }

    let request = HttpRequest::get(path.as_str()).header("Authorization", "Bearer ");
    let response = ctx.client.send(request).await?;
    verify!(
        REJECTED.contains(&response.status_code),
        "Empty bearer header was not rejected: {}",
        response.status_code
    );
    seen.push(json!({ "token": "Bearer ", "status": response.status_code }));

    Ok(ProbeOutcome::new(format!("{} malformed credentials rejected", seen.len()))
        .with_details(json!(seen)))
}

pub(super) async fn invalid_refresh_token(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let response = ctx
        .tokens
        .auth()
        .post(AUTH_GENERATE_ENDPOINT, INVALID_REFRESH_TOKEN)
        .await?;

    verify!(
        REJECTED.contains(&response.status_code),
        "Invalid refresh token accepted with {}",
        response.status_code
    );
    Ok(ProbeOutcome::new(format!("rejected with {}", response.status_code)))
}

pub(super) async fn missing_refresh_parameter(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let response = ctx
        .tokens
        .auth()
        .post_body(AUTH_GENERATE_ENDPOINT, &json!({}))
        .await?;

    verify!(
        MISSING_PARAMETER.contains(&response.status_code),
        "Expected 400/401 without refresh_token, got {}",
        response.status_code
    );
    Ok(ProbeOutcome::new(format!("rejected with {}", response.status_code)))
}

pub(super) async fn refresh_token_single_use(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let pair = ctx.tokens.fresh_pair().await?;
    let refresh_token = pair.refresh_token.unwrap_or_default();
    verify!(!refresh_token.is_empty(), "Failed to get fresh refresh token");

    let auth = ctx.tokens.auth();
    let first = auth.post(AUTH_REFRESH_ENDPOINT, &refresh_token).await?;
    verify!(
        first.status_code == 200,
        "First use of refresh token returned {}",
        first.status_code
    );

    let replay = auth.post(AUTH_REFRESH_ENDPOINT, &refresh_token).await?;
    verify!(
        REJECTED.contains(&replay.status_code),
        "Refresh token replay accepted with {}",
        replay.status_code
    );

    info!("Refresh token single-use enforced");
    Ok(ProbeOutcome::new(format!("replay rejected with {}", replay.status_code)))
}

pub(super) async fn shared_token_concurrency(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.fresh_token().await?;
    let path = TestEndpoint::One.path();

    let outcomes = ParallelExecutor::new(SHARED_TOKEN_REQUESTS)
        .fire(
            &ctx.client,
            &path,
            Some(&token),
            SHARED_TOKEN_REQUESTS,
            Some(&ctx.results),
        )
        .await;

    let statuses: Vec<Option<u16>> = outcomes.iter().map(|o| o.status_code).collect();
    verify!(
        outcomes.iter().all(|o| o.is_success()),
        "Concurrent requests sharing one token did not all succeed: {:?}",
        statuses
    );
    Ok(ProbeOutcome::new(format!(
        "{} concurrent requests with one token answered 200",
        outcomes.len()
    )))
}

pub(super) async fn rapid_requests(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.fresh_token().await?;
    let path = TestEndpoint::One.path();

    for i in 1..=RAPID_REQUESTS {
        let response = ctx.get_recorded(&path, &token).await?;
        verify!(
            response.status_code == 200,
            "Request {} of {} failed: {}",
            i,
            RAPID_REQUESTS,
            response.status_code
        );
    }

    info!("Rapid requests handled correctly");
    Ok(ProbeOutcome::new(format!("{RAPID_REQUESTS} rapid requests answered 200")))
}

pub(super) async fn token_expiry(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let pair = ctx.tokens.fresh_pair().await?;
    let expires_in = pair.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
    info!("Token expires in {} seconds", expires_in);

    pause((expires_in + EXPIRY_GRACE_SECS) as f64).await;

    let path = TestEndpoint::One.path();
    let response = ctx.get(&path, Some(&pair.access_token)).await?;
    verify!(
        DENIED.contains(&response.status_code),
        "Expired token accepted with {}",
        response.status_code
    );
    Ok(ProbeOutcome::new(format!(
        "rejected with {} after {}s",
        response.status_code,
        expires_in + EXPIRY_GRACE_SECS
    )))
}
