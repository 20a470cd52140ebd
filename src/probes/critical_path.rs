//! Critical user paths (43-47)
//!
//! Flows every client depends on: minting a token, reusing it across the
//! endpoints, recovering from a rejected call and chaining calls.

use anyhow::Result;
use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{error, info};

use super::{json_body, pause, ProbeContext, ProbeOutcome};
use crate::models::{TestEndpoint, AUTH_GENERATE_ENDPOINT};

const INVALID_TOKEN: &str = "invalid_token_xyz";
const JOURNEY: [TestEndpoint; 7] = [
    TestEndpoint::One,
    TestEndpoint::Two,
    TestEndpoint::Three,
    TestEndpoint::One,
    TestEndpoint::Four,
    TestEndpoint::Five,
    TestEndpoint::Six,
];
const JOURNEY_SPACING_SECS: f64 = 0.1;

pub(super) async fn token_generation(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let refresh_token = ctx.tokens.refresh_token()?;
    let response = ctx
        .tokens
        .auth()
        .post(AUTH_GENERATE_ENDPOINT, refresh_token)
        .await?;
    verify!(
        response.status_code == 200,
        "Expected 200, got {}",
        response.status_code
    );

    let body = json_body(&response)?;
    for field in ["access_token", "refresh_token", "expires_in"] {
        verify!(body.get(field).is_some(), "Missing {} in response", field);
    }

    let token_type = body.get("token_type").and_then(Value::as_str);
    verify!(
        token_type == Some("Bearer"),
        "Expected Bearer token type, got {:?}",
        token_type
    );

    let expires_in = body.get("expires_in").and_then(Value::as_i64);
    verify!(expires_in.is_some(), "expires_in must be an integer");
    let expires_in = expires_in.unwrap_or_default();
    verify!(expires_in > 0, "expires_in must be positive, got {}", expires_in);

    info!("Token generation successful, expires in {}s", expires_in);
    Ok(ProbeOutcome::new(format!("token expires in {expires_in}s")))
}

pub(super) async fn token_reuse(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.fresh_token().await?;
    let mut statuses = Vec::new();
    let mut successful = 0;

    for endpoint in TestEndpoint::all() {
        let path = endpoint.path();
        let status = match ctx.get_recorded(&path, &token).await {
            Ok(response) => response.status_code,
            Err(e) => {
                error!("{} failed: {}", path, e);
                0
            }
        };
        info!("{}: {}", path, status);
        if status == 200 {
            successful += 1;
        }
        statuses.push(format!("{path}={status}"));
    }

    let total = TestEndpoint::all().len();
    verify!(
        successful == total,
        "Only {}/{} endpoints succeeded with token reuse: {}",
        successful,
        total,
        statuses.join(", ")
    );
    Ok(ProbeOutcome::new(format!("one token accepted by all {total} endpoints")))
}

pub(super) async fn error_recovery(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.fresh_token().await?;
    let path = TestEndpoint::One.path();

    let first = ctx.get(&path, Some(&token)).await?;
    verify!(
        first.status_code == 200,
        "Initial request failed: {}",
        first.status_code
    );

    let rejected = ctx.get(&path, Some(INVALID_TOKEN)).await?;
    verify!(
        rejected.status_code != 200,
        "Request with an invalid token was accepted"
    );

    let recovered = ctx.get(&path, Some(&token)).await?;
    verify!(
        recovered.status_code == 200,
        "Recovery request failed: {}",
        recovered.status_code
    );

    Ok(ProbeOutcome::new(format!(
        "{} → {} → {}",
        first.status_code, rejected.status_code, recovered.status_code
    )))
}

pub(super) async fn concurrent_endpoint_access(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.fresh_token().await?;
    let paths: Vec<String> = TestEndpoint::all().iter().map(|e| e.path()).collect();

    let responses = join_all(paths.iter().map(|path| ctx.get_recorded(path, &token))).await;

    let mut failed = Vec::new();
    for (path, response) in paths.iter().zip(responses) {
        match response {
            Ok(response) if response.status_code == 200 => {}
            Ok(response) => failed.push(format!("{path}={}", response.status_code)),
            Err(e) => failed.push(format!("{path}: {e}")),
        }
    }

    verify!(
        failed.is_empty(),
        "Concurrent access failed: {}/{} calls succeeded ({})",
        paths.len() - failed.len(),
        paths.len(),
        failed.join(", ")
    );
    Ok(ProbeOutcome::new(format!(
        "all {} endpoints answered 200 concurrently",
        paths.len()
    )))
}

pub(super) async fn sequential_chain(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.fresh_token().await?;
    let mut steps = Vec::with_capacity(JOURNEY.len());

    for (i, endpoint) in JOURNEY.iter().enumerate() {
        let path = endpoint.path();
        let response = match ctx.get_recorded(&path, &token).await {
            Ok(response) => response,
            Err(e) => {
                return Err(super::ProbeFailure::new(format!(
                    "Journey interrupted at step {} ({}): {}",
                    i + 1,
                    path,
                    e
                ))
                .into())
            }
        };
        info!("Step {}: {} → {}", i + 1, path, response.status_code);
        steps.push(json!({ "endpoint": path, "status": response.status_code }));
        pause(JOURNEY_SPACING_SECS).await;
    }

    let successful = steps.iter().filter(|s| s["status"] == 200).count();
    let rendered: Vec<String> = steps
        .iter()
        .map(|s| format!("{}={}", s["endpoint"].as_str().unwrap_or_default(), s["status"]))
        .collect();
    verify!(
        successful == JOURNEY.len(),
        "Journey failed: {}/{} calls succeeded ({})",
        successful,
        JOURNEY.len(),
        rendered.join(" → ")
    );

    Ok(ProbeOutcome::new(format!("{}-step journey succeeded", JOURNEY.len()))
        .with_details(Value::from(steps)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::{testing, ProbeFailure};
    use tempfile::tempdir;
    use wiremock::matchers::{header, method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_generate(server: &MockServer, body: Value) {
        Mock::given(method("POST"))
            .and(path("/api/auth/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_all_endpoints(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path_regex(r"^/api/test/\d$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(testing::success_envelope()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_token_generation_structure() {
        let server = MockServer::start().await;
        mount_generate(
            &server,
            json!({
                "access_token": "a",
                "refresh_token": "r",
                "expires_in": 900,
                "token_type": "Bearer"
            }),
        )
        .await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let outcome = token_generation(&ctx).await.unwrap();
        assert_eq!(outcome.message.unwrap(), "token expires in 900s");
    }

    #[tokio::test]
    async fn test_token_generation_rejects_bad_shape() {
        let server = MockServer::start().await;
        mount_generate(
            &server,
            json!({
                "access_token": "a",
                "refresh_token": "r",
                "expires_in": "900",
                "token_type": "Bearer"
            }),
        )
        .await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let err = token_generation(&ctx).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProbeFailure>().unwrap().message(),
            "expires_in must be an integer"
        );
    }

    #[tokio::test]
    async fn test_token_generation_requires_bearer_type() {
        let server = MockServer::start().await;
        testing::mount_auth(&server).await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let err = token_generation(&ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "Expected Bearer token type, got None");
    }

    #[tokio::test]
    async fn test_token_reuse_names_failing_endpoints() {
        let server = MockServer::start().await;
        testing::mount_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/test/2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_all_endpoints(&server).await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let err = token_reuse(&ctx).await.unwrap_err();
        let message = err.downcast_ref::<ProbeFailure>().unwrap().message().to_string();
        assert!(message.starts_with("Only 5/6 endpoints succeeded with token reuse"));
        assert!(message.contains("/api/test/2=500"));
    }

    #[tokio::test]
    async fn test_error_recovery() {
        let server = MockServer::start().await;
        testing::mount_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/test/1"))
            .and(header("authorization", "Bearer access-token"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/test/1"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let outcome = error_recovery(&ctx).await.unwrap();
        assert_eq!(outcome.message.unwrap(), "200 → 401 → 200");
    }

    #[tokio::test]
    async fn test_concurrent_endpoint_access() {
        let server = MockServer::start().await;
        testing::mount_auth(&server).await;
        mount_all_endpoints(&server).await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let outcome = concurrent_endpoint_access(&ctx).await.unwrap();
        assert_eq!(
            outcome.message.unwrap(),
            "all 6 endpoints answered 200 concurrently"
        );
        assert_eq!(ctx.results.summary().stable, 6);
    }

    #[tokio::test]
    async fn test_sequential_chain_reports_broken_step() {
        let server = MockServer::start().await;
        testing::mount_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/test/3"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        mount_all_endpoints(&server).await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let err = sequential_chain(&ctx).await.unwrap_err();
        let message = err.downcast_ref::<ProbeFailure>().unwrap().message().to_string();
        assert!(message.starts_with("Journey failed: 6/7 calls succeeded"));
        assert!(message.contains("/api/test/3=503"));
        assert_eq!(ctx.results.get("/api/test/1").unwrap().passed, 2);
    }
}
