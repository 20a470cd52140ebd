//! Functional probes (7-9)

use anyhow::Result;
use serde_json::{json, Map, Value};
use tracing::info;

use super::{check_envelope, json_body, ProbeContext, ProbeOutcome};
use crate::models::{CounterData, TestEndpoint};
use crate::utils::logger::log_api_request;

pub(super) async fn endpoint_availability(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let mut statuses = Map::new();

    for (i, endpoint) in TestEndpoint::all().into_iter().enumerate() {
        let path = endpoint.path();
        let response = ctx.get_recorded(&path, &token).await?;
        log_api_request(
            i + 1,
            "GET",
            &path,
            response.status_code,
            response.elapsed_secs(),
        );

        verify!(
            (100..600).contains(&response.status_code),
            "{} returned invalid status {}",
            path,
            response.status_code
        );
        statuses.insert(path, json!(response.status_code));
    }

    let up = statuses.values().filter(|s| s.as_u64() == Some(200)).count();
    Ok(
        ProbeOutcome::new(format!("{up}/{} endpoints answered 200", statuses.len()))
            .with_details(Value::Object(statuses)),
    )
}

pub(super) async fn response_envelope(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let mut checked = 0;
    let mut errors = Vec::new();

    for endpoint in TestEndpoint::all() {
        let path = endpoint.path();
        let response = ctx.get_recorded(&path, &token).await?;

        if response.status_code == 200 {
            verify!(!response.body.is_empty(), "{} returned an empty body", path);
            let content_type = response.content_type().unwrap_or_default();
            verify!(
                content_type.contains("application/json"),
                "{} returned content type '{}'",
                path,
                content_type
            );
            let body = json_body(&response)?;
            check_envelope(&body, "success")?;
            checked += 1;
        } else if let Some(body) = response.json_value().filter(|b| b.get("status").is_some()) {
            check_envelope(&body, "error")?;
            info!("{} error envelope: {}", path, body);
            errors.push(format!("{path} ({})", response.status_code));
        }
    }

    let mut message = format!("{checked} success envelopes valid");
    if !errors.is_empty() {
        message.push_str(&format!(", error envelopes from {}", errors.join(", ")));
    }
    Ok(ProbeOutcome::new(message))
}

pub(super) async fn counter_data(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let token = ctx.tokens.session_token().await?;
    let path = TestEndpoint::Six.path();

    let response = ctx.get_recorded(&path, &token).await?;
    verify!(
        response.status_code == 200,
        "{} returned {}",
        path,
        response.status_code
    );

    let body = json_body(&response)?;
    check_envelope(&body, "success")?;

    let data = body.get("data").cloned();
    verify!(data.is_some(), "{} response missing 'data' field", path);

    let parsed = serde_json::from_value::<CounterData>(data.unwrap_or_default());
    verify!(
        parsed.is_ok(),
        "'data' must hold integer count, id and value: {}",
        body["data"]
    );
    let data = parsed?;

    Ok(ProbeOutcome::new(format!(
        "count={} id={} value={}",
        data.count, data.id, data.value
    )))
}
