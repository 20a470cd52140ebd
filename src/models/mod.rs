//! Data models for API discovery
//!
//! Endpoint catalogue, response envelopes and probe outcomes.

mod endpoint;
mod probe;

pub use endpoint::{
    ApiEnvelope, CounterData, HealthBody, TestEndpoint, AUTH_GENERATE_ENDPOINT,
    AUTH_REFRESH_ENDPOINT, HEALTH_ENDPOINT, OPENAPI_YAML_ENDPOINT, TEST_ENDPOINT_PREFIX,
};
pub use probe::{ProbeCase, ProbeResult, ProbeStatus, SessionSummary};
