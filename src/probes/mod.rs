//! Probe implementations
//!
//! Each probe drives live HTTP traffic against the service and checks what
//! comes back against the behavior observed so far.
//!
//! ## Categories
//!
//! - Health (1-2): liveness endpoint
//! - Schema (3-6): OpenAPI document and response compliance
//! - Functional (7-9): availability and response envelopes
//! - Discovery (10-23): rate limits, warmup, cooldown, delays
//! - Performance (24-26): concurrency, latency bands, burst load
//! - Reliability (27-31): retries, client timeouts, DNS failure, recovery
//! - Security (32-39): token handling
//! - Regression (40-47): documented defects and critical user paths
//!
//! A probe returns `Ok(ProbeOutcome)` when every check held. A failed check
//! is a [`ProbeFailure`], a [`ProbeSkipped`] means the precondition for the
//! check never arose, and any other error means the probe could not run.

#![allow(dead_code)]

/// Return a [`ProbeFailure`] from the enclosing probe unless `cond` holds
macro_rules! verify {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::probes::ProbeFailure::new(format!($($arg)+)).into());
        }
    };
}

mod critical_path;
mod discovery;
mod functional;
mod health;
mod performance;
mod regression;
mod reliability;
mod schema;
mod security;

use anyhow::{Context, Result};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::auth::{AuthClient, TokenProvider};
use crate::config::AppConfig;
use crate::executor::ParallelExecutor;
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::models::ProbeCase;
use crate::results::{DiscoveryReport, ResultAggregator};
use crate::schema::SchemaManager;

pub use discovery::SWEEP_MATRIX;

/// A check inside a probe did not hold
#[derive(Error, Debug)]
#[error("{0}")]
pub struct ProbeFailure(String);

impl ProbeFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// The probe could not observe the behavior it checks
#[derive(Error, Debug)]
#[error("{0}")]
pub struct ProbeSkipped(String);

impl ProbeSkipped {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// What a passing probe reports
#[derive(Clone, Debug, Default)]
pub struct ProbeOutcome {
    pub message: Option<String>,
    pub details: Option<Value>,
}

impl ProbeOutcome {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Everything a probe needs for one session
pub struct ProbeContext {
    pub config: AppConfig,
    pub client: HttpClient,
    pub tokens: TokenProvider,
    pub results: ResultAggregator,
    pub schema: SchemaManager,
    report: OnceCell<DiscoveryReport>,
}

impl ProbeContext {
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = HttpClient::with_options(config.request_timeout(), config.ssl_verify)?
            .base_url(config.base_url.clone());

        let auth_client = client.with_timeout(config.auth_timeout())?;
        let tokens = TokenProvider::new(AuthClient::new(auth_client), config.refresh_token.clone());

        let schema_client = client.with_timeout(config.schema_timeout())?;
        let schema = SchemaManager::new(schema_client, config.schema_dir.clone())
            .context("Failed to prepare schema directory")?;

        Ok(Self {
            config,
            client,
            tokens,
            results: ResultAggregator::new(),
            schema,
            report: OnceCell::new(),
        })
    }

    /// Share an aggregator owned elsewhere
    pub fn with_results(mut self, results: ResultAggregator) -> Self {
        self.results = results;
        self
    }

    /// Discovery report for this session, created on first use
    pub async fn report(&self) -> Result<&DiscoveryReport> {
        self.report
            .get_or_try_init(|| async { DiscoveryReport::create(&self.config.report_dir) })
            .await
    }

    /// Worker pool bounded by the configured worker count
    pub fn executor(&self) -> ParallelExecutor {
        ParallelExecutor::new(self.config.max_workers)
    }

    /// GET with an optional bearer token; nothing is recorded
    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<HttpResponse> {
        let mut request = HttpRequest::get(path);
        if let Some(token) = token {
            request = request.bearer(token);
        }
        self.client.send(request).await
    }

    /// GET and record the outcome as pass (200) or fail
    pub async fn get_recorded(&self, path: &str, token: &str) -> Result<HttpResponse> {
        match self.get(path, Some(token)).await {
            Ok(response) => {
                self.results
                    .record_response(path, response.status_code, response.elapsed_secs());
                Ok(response)
            }
            Err(e) => {
                self.results.record_error(path);
                Err(e)
            }
        }
    }

    /// GET and record the status and timing without judging them
    pub async fn get_observed(&self, path: &str, token: &str) -> Result<HttpResponse> {
        let response = self.get(path, Some(token)).await?;
        self.results
            .record_observation(path, response.status_code, response.elapsed_secs());
        Ok(response)
    }
}

/// Parse a response body as JSON, failing the probe if it is not
pub(crate) fn json_body(response: &HttpResponse) -> Result<Value> {
    match response.json_value() {
        Some(value) => Ok(value),
        None => Err(ProbeFailure::new(format!(
            "Response is not valid JSON: {}",
            response.body_preview(100)
        ))
        .into()),
    }
}

/// Check the `{message, status, timestamp}` envelope with the given status
pub(crate) fn check_envelope(body: &Value, expected_status: &str) -> Result<()> {
    verify!(body.is_object(), "Response must be a JSON object, got {}", body);
    for field in ["message", "status", "timestamp"] {
        verify!(
            body.get(field).is_some(),
            "Response missing '{}' field",
            field
        );
    }
    let status = body.get("status").and_then(Value::as_str).unwrap_or_default();
    verify!(
        status == expected_status,
        "Expected status='{}', got '{}'",
        expected_status,
        status
    );
    Ok(())
}

pub(crate) async fn pause(secs: f64) {
    if secs > 0.0 {
        tokio::time::sleep(std::time::Duration::from_secs_f64(secs)).await;
    }
}

/// Run a single probe
pub async fn run_probe(probe: ProbeCase, ctx: &ProbeContext) -> Result<ProbeOutcome> {
    debug!("Dispatching {}", probe);

    match probe {
        ProbeCase::HealthCheck => health::health_check(ctx).await,
        ProbeCase::HealthConsistency => health::health_consistency(ctx).await,

        ProbeCase::SchemaAvailability => schema::schema_availability(ctx).await,
        ProbeCase::SchemaStructure => schema::schema_structure(ctx).await,
        ProbeCase::SchemaTestEndpoints => schema::schema_test_endpoints(ctx).await,
        ProbeCase::SchemaCompliance => schema::schema_compliance(ctx).await,

        ProbeCase::EndpointAvailability => functional::endpoint_availability(ctx).await,
        ProbeCase::ResponseEnvelope => functional::response_envelope(ctx).await,
        ProbeCase::CounterData => functional::counter_data(ctx).await,

        ProbeCase::EndpointSweep => discovery::endpoint_sweep(ctx).await,
        ProbeCase::WarmupRecovery => discovery::warmup_recovery(ctx).await,
        ProbeCase::WarmupCycles => discovery::warmup_cycles(ctx).await,
        ProbeCase::WarmupRateLimit => discovery::warmup_rate_limit(ctx).await,
        ProbeCase::RateLimitPersistence => discovery::rate_limit_persistence(ctx).await,
        ProbeCase::BurstRateLimit => discovery::burst_rate_limit(ctx).await,
        ProbeCase::CooldownWindow => discovery::cooldown_window(ctx).await,
        ProbeCase::RateLimitIsolation => discovery::rate_limit_isolation(ctx).await,
        ProbeCase::FixedDelay => discovery::fixed_delay(ctx).await,
        ProbeCase::ResponseTimeConsistency => discovery::response_time_consistency(ctx).await,
        ProbeCase::RedirectDetection => discovery::redirect_detection(ctx).await,
        ProbeCase::ServerRouting => discovery::server_routing(ctx).await,
        ProbeCase::CallSequence => discovery::call_sequence(ctx).await,
        ProbeCase::HttpMethods => discovery::http_methods(ctx).await,

        ProbeCase::ConcurrentRequests => performance::concurrent_requests(ctx).await,
        ProbeCase::LatencyThresholds => performance::latency_thresholds(ctx).await,
        ProbeCase::BurstLoad => performance::burst_load(ctx).await,

        ProbeCase::RetryResilience => reliability::retry_resilience(ctx).await,
        ProbeCase::TimeoutEnforcement => reliability::timeout_enforcement(ctx).await,
        ProbeCase::DnsFailure => reliability::dns_failure(ctx).await,
        ProbeCase::EndpointRecovery => reliability::endpoint_recovery(ctx).await,
        ProbeCase::ConcurrentResilience => reliability::concurrent_resilience(ctx).await,

        ProbeCase::UnauthenticatedAccess => security::unauthenticated_access(ctx).await,
        ProbeCase::InvalidTokens => security::invalid_tokens(ctx).await,
        ProbeCase::InvalidRefreshToken => security::invalid_refresh_token(ctx).await,
        ProbeCase::MissingRefreshParameter => security::missing_refresh_parameter(ctx).await,
        ProbeCase::RefreshTokenSingleUse => security::refresh_token_single_use(ctx).await,
        ProbeCase::SharedTokenConcurrency => security::shared_token_concurrency(ctx).await,
        ProbeCase::RapidRequests => security::rapid_requests(ctx).await,
        ProbeCase::TokenExpiry => security::token_expiry(ctx).await,

        ProbeCase::BrokenEndpoint => regression::broken_endpoint(ctx).await,
        ProbeCase::ColdStart => regression::cold_start(ctx).await,
        ProbeCase::DelayRemoved => regression::delay_removed(ctx).await,
        ProbeCase::TokenGeneration => critical_path::token_generation(ctx).await,
        ProbeCase::TokenReuse => critical_path::token_reuse(ctx).await,
        ProbeCase::ErrorRecovery => critical_path::error_recovery(ctx).await,
        ProbeCase::ConcurrentEndpointAccess => {
            critical_path::concurrent_endpoint_access(ctx).await
        }
        ProbeCase::SequentialChain => critical_path::sequential_chain(ctx).await,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::path::Path;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Context pointed at a mock server, with a refresh token and temp dirs
    pub(crate) fn context(server: &MockServer, dir: &Path) -> ProbeContext {
        let config = AppConfig {
            base_url: server.uri(),
            refresh_token: Some("initial-refresh".to_string()),
            schema_dir: dir.join("schemas"),
            log_dir: dir.join("logs"),
            report_dir: dir.join("reports"),
            ..AppConfig::default()
        };
        ProbeContext::new(config).unwrap()
    }

    /// Mount a generate endpoint handing out `access-token`
    pub(crate) async fn mount_auth(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/auth/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access-token",
                "refresh_token": "rotated-refresh",
                "expires_in": 900
            })))
            .mount(server)
            .await;
    }

    pub(crate) fn success_envelope() -> Value {
        serde_json::json!({
            "message": "ok",
            "status": "success",
            "timestamp": "2026-03-07T14:05:09Z"
        })
    }

    pub(crate) fn error_envelope(message: &str) -> Value {
        serde_json::json!({
            "message": message,
            "status": "error",
            "timestamp": "2026-03-07T14:05:09Z"
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_probe_failure_downcast() {
        fn check(value: u16) -> Result<()> {
            verify!(value == 200, "Expected 200, got {}", value);
            Ok(())
        }

        assert!(check(200).is_ok());
        let err = check(500).unwrap_err();
        let failure = err.downcast_ref::<ProbeFailure>().unwrap();
        assert_eq!(failure.message(), "Expected 200, got 500");
    }

    #[test]
    fn test_check_envelope() {
        let ok = json!({"message": "m", "status": "success", "timestamp": "t"});
        assert!(check_envelope(&ok, "success").is_ok());

        let err = check_envelope(&ok, "error").unwrap_err();
        assert!(err.to_string().contains("Expected status='error'"));

        let missing = json!({"message": "m", "status": "success"});
        let err = check_envelope(&missing, "success").unwrap_err();
        assert_eq!(err.to_string(), "Response missing 'timestamp' field");

        assert!(check_envelope(&json!([1, 2]), "success").is_err());
    }
}
