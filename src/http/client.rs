//! HTTP client for probing the service under test
//!
//! Wraps `reqwest` with a base URL, optional bearer auth, per-request
//! timeouts and an opt-out of redirect following. Every response carries the
//! wall-clock time it took.

#![allow(dead_code)]

use anyhow::{Context, Result};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION},
    redirect::Policy,
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// HTTP client errors
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout after {0:.1} seconds")]
    Timeout(f64),

    #[error("Connection failed to {0}")]
    ConnectionFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl HttpError {
    /// True if `err` is a client-side timeout
    pub fn is_timeout(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<HttpError>(), Some(HttpError::Timeout(_)))
    }

    /// True if `err` happened before any response (DNS, refused, reset)
    pub fn is_connection(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<HttpError>(),
            Some(HttpError::ConnectionFailed(_))
        )
    }
}

/// HTTP client for probing
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    no_redirect: Client,
    base_url: Option<String>,
    default_headers: HeaderMap,
    timeout: Duration,
    ssl_verify: bool,
}

impl HttpClient {
    /// Create a new HTTP client with a 10 second timeout and TLS verification on
    pub fn new() -> Result<Self> {
        Self::with_options(Duration::from_secs(10), true)
    }

    /// Create client with custom timeout and TLS verification
    pub fn with_options(timeout: Duration, ssl_verify: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!ssl_verify)
            .build()
            .context("Failed to create HTTP client")?;

        let no_redirect = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .danger_accept_invalid_certs(!ssl_verify)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            no_redirect,
            base_url: None,
            default_headers: HeaderMap::new(),
            timeout,
            ssl_verify,
        })
    }

    /// Set base URL for requests
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Add default header
    pub fn default_header(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let header_name =
            HeaderName::from_bytes(key.as_ref().as_bytes()).context("Invalid header name")?;
        let header_value = HeaderValue::from_str(value.as_ref()).context("Invalid header value")?;
        self.default_headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Copy of this client with a different default timeout
    pub fn with_timeout(&self, timeout: Duration) -> Result<Self> {
        let mut client = Self::with_options(timeout, self.ssl_verify)?;
        client.base_url = self.base_url.clone();
        client.default_headers = self.default_headers.clone();
        Ok(client)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build full URL
    pub fn build_url(&self, path: &str) -> String {
        match &self.base_url {
            Some(base) => {
                if path.starts_with("http://") || path.starts_with("https://") {
                    path.to_string()
                } else {
                    format!("{}{}", base.trim_end_matches('/'), path)
                }
            }
            None => path.to_string(),
        }
    }

    /// Send HTTP request
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = self.build_url(&request.url);
        debug!("Sending {} request to {}", request.method, url);

        let method =
            Method::from_bytes(request.method.as_bytes()).context("Invalid HTTP method")?;

        let client = if request.follow_redirects {
            &self.client
        } else {
            &self.no_redirect
        };
        let mut req_builder = client.request(method, &url);

        for (key, value) in &self.default_headers {
            req_builder = req_builder.header(key, value);
        }

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        if let Some(body) = &request.body {
            req_builder = req_builder
                .header("Content-Type", "application/json")
                .body(body.clone());
        }

        let timeout = request.timeout.unwrap_or(self.timeout);
        req_builder = req_builder.timeout(timeout);

        let start = Instant::now();

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow::anyhow!(HttpError::Timeout(timeout.as_secs_f64()))
            } else if e.is_connect() {
                anyhow::anyhow!(HttpError::ConnectionFailed(url.clone()))
            } else if e.is_builder() {
                anyhow::anyhow!(HttpError::InvalidUrl(url.clone()))
            } else {
                anyhow::anyhow!(HttpError::RequestFailed(e.to_string()))
            }
        })?;

        let status = response.status();

        let mut response_headers = HashMap::new();
        for (key, value) in response.headers().iter() {
            if let Ok(v) = value.to_str() {
                response_headers.insert(key.to_string(), v.to_string());
            }
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                anyhow::anyhow!(HttpError::Timeout(timeout.as_secs_f64()))
            } else {
                anyhow::anyhow!(HttpError::RequestFailed(e.to_string()))
            }
        })?;

        let elapsed = start.elapsed();

        debug!(
            "Response: {} {} in {:.3}s",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            elapsed.as_secs_f64()
        );

        Ok(HttpResponse {
            status_code: status.as_u16(),
            headers: response_headers,
            body,
            elapsed,
        })
    }

    /// Convenience method for GET request
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.send(HttpRequest::get(url)).await
    }

    /// GET with a bearer token
    pub async fn get_auth(&self, url: &str, token: &str) -> Result<HttpResponse> {
        self.send(HttpRequest::get(url).bearer(token)).await
    }

    /// POST a JSON body
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<HttpResponse> {
        let body = serde_json::to_string(body).context("Failed to encode request body")?;
        self.send(HttpRequest::post(url).body(body)).await
    }
}

/// HTTP request builder
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
    pub follow_redirects: bool,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
            follow_redirects: true,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// `Authorization: Bearer <token>`
    pub fn bearer(self, token: &str) -> Self {
        self.header(AUTHORIZATION.as_str(), format!("Bearer {token}"))
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn no_redirect(mut self) -> Self {
        self.follow_redirects = false;
        self
    }
}

/// HTTP response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub elapsed: Duration,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == 200
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status_code, 301 | 302 | 303 | 307 | 308)
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers.get(&name.to_lowercase())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get_header("content-type").map(String::as_str)
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).context("Response body is not valid JSON")
    }

    /// Body as a JSON value, if it parses
    pub fn json_value(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// First `max` characters of the body
    pub fn body_preview(&self, max: usize) -> String {
        if self.body.chars().count() > max {
            format!("{}...", self.body.chars().take(max).collect::<String>())
        } else {
            self.body.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn response(status_code: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status_code,
            headers: HashMap::from([("content-type".to_string(), "application/json".to_string())]),
            body: body.to_string(),
            elapsed: Duration::from_millis(120),
        }
    }

    #[test]
    fn test_http_request_builder() {
        let req = HttpRequest::get("/api/test/1")
            .bearer("abc")
            .header("X-Custom", "value")
            .no_redirect();

        assert_eq!(req.method, "GET");
        assert_eq!(req.headers.len(), 2);
        assert_eq!(req.headers.get("authorization").map(String::as_str), Some("Bearer abc"));
        assert!(!req.follow_redirects);
    }

    #[test]
    fn test_http_response_helpers() {
        let resp = response(200, r#"{"status":"success"}"#);
        assert!(resp.is_ok());
        assert!(!resp.is_redirect());
        assert_eq!(resp.content_type(), Some("application/json"));
        assert_eq!(resp.json_value().unwrap()["status"], "success");
        assert!((resp.elapsed_secs() - 0.12).abs() < 1e-9);
    }

    #[test]
    fn test_body_preview() {
        let resp = response(500, &"x".repeat(300));
        assert_eq!(resp.body_preview(200).len(), 203);
        assert_eq!(response(200, "short").body_preview(200), "short");
    }

    #[test]
    fn test_build_url() {
        let client = HttpClient::new().unwrap().base_url("http://host:8080/");
        assert_eq!(client.build_url("/health"), "http://host:8080/health");
        assert_eq!(client.build_url("https://other/x"), "https://other/x");
    }

    #[tokio::test]
    async fn test_get_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/test/1"))
            .and(header("Authorization", "Bearer token-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Server", "mock")
                    .set_body_json(json!({"message": "ok", "status": "success"})),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap().base_url(server.uri());
        let resp = client.get_auth("/api/test/1", "token-1").await.unwrap();

        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.get_header("Server").map(String::as_str), Some("mock"));
        assert_eq!(resp.json_value().unwrap()["status"], "success");
    }

    #[tokio::test]
    async fn test_post_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(body_json(json!({"refresh_token": "r"})))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap().base_url(server.uri());
        let resp = client
            .post_json("/echo", &json!({"refresh_token": "r"}))
            .await
            .unwrap();
        assert_eq!(resp.status_code, 201);
    }

    #[tokio::test]
    async fn test_redirect_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/moved"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/target"))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap().base_url(server.uri());
        let resp = client
            .send(HttpRequest::get("/moved").no_redirect())
            .await
            .unwrap();

        assert_eq!(resp.status_code, 302);
        assert!(resp.is_redirect());
        assert_eq!(resp.get_header("location").map(String::as_str), Some("/target"));
    }

    #[tokio::test]
    async fn test_timeout_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap().base_url(server.uri());
        let err = client
            .send(HttpRequest::get("/slow").timeout(Duration::from_millis(100)))
            .await
            .unwrap_err();

        assert!(HttpError::is_timeout(&err));
    }

    #[tokio::test]
    async fn test_connection_failure_is_classified() {
        let client = HttpClient::with_options(Duration::from_secs(2), true).unwrap();
        let err = client.get("http://127.0.0.1:1/health").await.unwrap_err();

        assert!(HttpError::is_connection(&err));
        assert!(!HttpError::is_timeout(&err));
    }
}
