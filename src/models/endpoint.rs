//! Endpoint catalogue and response envelopes of the service under test

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Health check path (no auth)
pub const HEALTH_ENDPOINT: &str = "/health";
/// OpenAPI document path
pub const OPENAPI_YAML_ENDPOINT: &str = "/openapi.yaml";
/// Token generation path
pub const AUTH_GENERATE_ENDPOINT: &str = "/api/auth/generate";
/// Token refresh path
pub const AUTH_REFRESH_ENDPOINT: &str = "/api/auth/refresh";
/// Prefix shared by the six test endpoints
pub const TEST_ENDPOINT_PREFIX: &str = "/api/test/";

/// The six undocumented test endpoints
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TestEndpoint {
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
}

impl TestEndpoint {
    pub fn number(&self) -> u8 {
        match self {
            TestEndpoint::One => 1,
            TestEndpoint::Two => 2,
            TestEndpoint::Three => 3,
            TestEndpoint::Four => 4,
            TestEndpoint::Five => 5,
            TestEndpoint::Six => 6,
        }
    }

    /// Request path, e.g. `/api/test/4`
    pub fn path(&self) -> String {
        format!("{}{}", TEST_ENDPOINT_PREFIX, self.number())
    }

    pub fn all() -> Vec<TestEndpoint> {
        vec![
            TestEndpoint::One,
            TestEndpoint::Two,
            TestEndpoint::Three,
            TestEndpoint::Four,
            TestEndpoint::Five,
            TestEndpoint::Six,
        ]
    }

    pub fn from_number(n: u8) -> Option<TestEndpoint> {
        match n {
            1 => Some(TestEndpoint::One),
            2 => Some(TestEndpoint::Two),
            3 => Some(TestEndpoint::Three),
            4 => Some(TestEndpoint::Four),
            5 => Some(TestEndpoint::Five),
            6 => Some(TestEndpoint::Six),
            _ => None,
        }
    }
}

impl fmt::Display for TestEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Standard JSON envelope returned by the test endpoints
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiEnvelope {
    pub message: String,
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ApiEnvelope {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

/// Payload nested under `data` by endpoint 6
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterData {
    pub count: i64,
    pub id: i64,
    pub value: i64,
}

/// Body of `GET /health`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
    pub timestamp: serde_json::Value,
}

impl HealthBody {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}
