//! Regression probes for documented defects (40-42)
//!
//! Each probe asserts the fixed behavior of a documented defect, so on the
//! current service they are expected to fail.

use anyhow::Result;

use super::{pause, ProbeContext, ProbeOutcome};
use crate::models::TestEndpoint;

const IDLE_SECS: f64 = 65.0;
const MAX_DELAY_SECS: f64 = 1.0;

pub(super) async fn broken_endpoint(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let path = TestEndpoint::Two.path();

    let response = ctx.get_recorded(&path, &token).await?;
    verify!(
        response.status_code == 200,
        "{} broken: got {}",
        path,
        response.status_code
    );
    Ok(ProbeOutcome::new(format!("{path} answered 200")))
}

pub(super) async fn cold_start(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let path = TestEndpoint::Three.path();

    pause(IDLE_SECS).await;

    let response = ctx.get_recorded(&path, &token).await?;
    verify!(
        response.status_code == 200,
        "{} requires warmup: got {} after {}s idle",
        path,
        response.status_code,
        IDLE_SECS
    );
    Ok(ProbeOutcome::new(format!("{path} answered 200 after {IDLE_SECS}s idle")))
}

pub(super) async fn delay_removed(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let path = TestEndpoint::Five.path();

    let response = ctx.get_recorded(&path, &token).await?;
    let elapsed = response.elapsed_secs();
    verify!(
        elapsed < MAX_DELAY_SECS,
        "{} still has delay: {:.2}s (should be <{}s)",
        path,
        elapsed,
        MAX_DELAY_SECS
    );
    Ok(ProbeOutcome::new(format!("{path} answered in {elapsed:.3}s")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::{testing, ProbeFailure};
    use std::time::Duration;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_broken_endpoint_reports_status() {
        let server = MockServer::start().await;
        testing::mount_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/test/2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let err = broken_endpoint(&ctx).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProbeFailure>().unwrap().message(),
            "/api/test/2 broken: got 500"
        );
        assert_eq!(ctx.results.get("/api/test/2").unwrap().failed, 1);
    }

    #[tokio::test]
    async fn test_delay_removed() {
        let server = MockServer::start().await;
        testing::mount_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/test/5"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1200)))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let ctx = testing::context(&server, dir.path());

        let err = delay_removed(&ctx).await.unwrap_err();
        assert!(err.to_string().starts_with("/api/test/5 still has delay: 1."));
    }
}
