//! Schema probes (3-6)
//!
//! The OpenAPI document is fetched as YAML, cached as JSON by the schema
//! manager, and then used to check live responses.

use anyhow::Result;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{json_body, ProbeContext, ProbeOutcome};
use crate::models::{TestEndpoint, OPENAPI_YAML_ENDPOINT};
use crate::schema::BEARER_SCHEME;

const EXPECTED_TEST_ENDPOINTS: usize = 6;

pub(super) async fn schema_availability(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let client = ctx.client.with_timeout(ctx.config.schema_timeout())?;
    let response = client.get(OPENAPI_YAML_ENDPOINT).await?;

    verify!(
        response.status_code == 200,
        "Schema endpoint returned {}",
        response.status_code
    );
    verify!(!response.body.trim().is_empty(), "Schema body is empty");

    Ok(ProbeOutcome::new(format!(
        "{} bytes in {:.3}s",
        response.body.len(),
        response.elapsed_secs()
    )))
}

pub(super) async fn schema_structure(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let doc = ctx.schema.get_schema().await?;

    let version = doc.version().unwrap_or_default();
    verify!(
        version.starts_with("3."),
        "Expected OpenAPI 3.x, got '{}'",
        version
    );
    verify!(doc.has_info(), "Schema missing 'info' section");
    verify!(doc.has_paths(), "Schema missing 'paths' section");

    let title = doc.title().unwrap_or("unknown");
    let api_version = doc.api_version().unwrap_or("unknown");
    info!("API: {} v{} (OpenAPI {})", title, api_version, version);

    let operations = doc.operations();
    for (path, methods) in &operations {
        info!("  {} [{}]", path, methods.join(", ").to_uppercase());
    }

    Ok(
        ProbeOutcome::new(format!("{title} v{api_version}, {} paths", operations.len()))
            .with_details(json!(operations
                .iter()
                .map(|(path, methods)| (path.clone(), Value::from(methods.clone())))
                .collect::<serde_json::Map<String, Value>>())),
    )
}

pub(super) async fn schema_test_endpoints(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let endpoints = ctx.schema.get_all_test_endpoints().await?;
    verify!(
        endpoints.len() == EXPECTED_TEST_ENDPOINTS,
        "Expected {} test endpoints, found {}: {:?}",
        EXPECTED_TEST_ENDPOINTS,
        endpoints.len(),
        endpoints
    );

    let doc = ctx.schema.get_schema().await?;
    let scheme = doc.security_scheme(BEARER_SCHEME);
    verify!(scheme.is_some(), "Security scheme '{}' not defined", BEARER_SCHEME);

    let scheme = scheme.cloned().unwrap_or_default();
    let kind = scheme.get("type").and_then(Value::as_str).unwrap_or_default();
    let name = scheme.get("scheme").and_then(Value::as_str).unwrap_or_default();
    verify!(kind == "http", "Expected scheme type 'http', got '{}'", kind);
    verify!(
        name.eq_ignore_ascii_case("bearer"),
        "Expected scheme 'bearer', got '{}'",
        name
    );

    Ok(ProbeOutcome::new(endpoints.join(", ")))
}

pub(super) async fn schema_compliance(ctx: &ProbeContext) -> Result<ProbeOutcome> {
    let doc = ctx.schema.get_schema().await?;
    let token = ctx.tokens.session_token().await?;

    let mut validated = Vec::new();
    let mut skipped = Vec::new();

    for endpoint in TestEndpoint::all() {
        let path = endpoint.path();

        verify!(
            doc.supports_method(&path, "get"),
            "{} does not document GET",
            path
        );
        verify!(
            doc.requires_bearer_auth(&path, "get")?,
            "{} does not require bearer auth",
            path
        );

        let response = ctx.get_recorded(&path, &token).await?;
        if response.status_code != 200 {
            warn!("{} returned {}, skipping compliance check", path, response.status_code);
            skipped.push(format!("{path} ({})", response.status_code));
            continue;
        }

        let documented = doc.response_content_types(&path, "get", 200)?;
        let content_type = response.content_type().unwrap_or_default();
        verify!(
            documented.is_empty() || documented.iter().any(|t| content_type.starts_with(t.as_str())),
            "{} returned content type '{}', documented {:?}",
            path,
            content_type,
            documented
        );

        let body = json_body(&response)?;
        let violations = doc.validate_response(&path, "get", &body)?;
        verify!(
            violations.is_empty(),
            "{} violates its response schema: {}",
            path,
            violations.join("; ")
        );

        validated.push(path);
    }

    let mut message = format!("{} endpoints compliant", validated.len());
    if !skipped.is_empty() {
        message.push_str(&format!(", not checked: {}", skipped.join(", ")));
    }
    Ok(ProbeOutcome::new(message).with_details(json!({
        "validated": validated,
        "skipped": skipped,
    })))
}
