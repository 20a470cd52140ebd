//! Bearer token acquisition
//!
//! Access tokens are minted by posting a refresh token to the generate
//! endpoint. Probes either share one session-scoped token or ask for a fresh
//! one each time.

#![allow(dead_code)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::http::{HttpClient, HttpResponse};
use crate::models::{AUTH_GENERATE_ENDPOINT, AUTH_REFRESH_ENDPOINT};

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("INITIAL_REFRESH_TOKEN is not set")]
    MissingRefreshToken,

    #[error("Token request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed token response: {0}")]
    MalformedResponse(String),
}

/// Token payload returned by the generate and refresh endpoints
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Client for the auth endpoints
#[derive(Clone)]
pub struct AuthClient {
    client: HttpClient,
}

impl AuthClient {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Exchange a refresh token for an access token
    pub async fn generate(&self, refresh_token: &str) -> Result<TokenPair> {
        let response = self.post(AUTH_GENERATE_ENDPOINT, refresh_token).await?;
        parse_token_response(response)
    }

    /// Rotate a refresh token; the old one is expected to become unusable
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let response = self.post(AUTH_REFRESH_ENDPOINT, refresh_token).await?;
        parse_token_response(response)
    }

    /// Raw POST of `{"refresh_token": ...}` for probes that inspect rejections
    pub async fn post(&self, endpoint: &str, refresh_token: &str) -> Result<HttpResponse> {
        self.post_body(endpoint, &json!({ "refresh_token": refresh_token }))
            .await
    }

    /// Raw POST of an arbitrary JSON body
    pub async fn post_body(&self, endpoint: &str, body: &Value) -> Result<HttpResponse> {
        self.client
            .post_json(endpoint, body)
            .await
            .with_context(|| format!("Auth request to {endpoint} failed"))
    }
}

fn parse_token_response(response: HttpResponse) -> Result<TokenPair> {
    if response.status_code != 200 {
        return Err(AuthError::Rejected {
            status: response.status_code,
            body: response.body_preview(200),
        }
        .into());
    }

    response
        .json::<TokenPair>()
        .map_err(|e| AuthError::MalformedResponse(e.to_string()).into())
}

/// Supplies bearer tokens to probes
pub struct TokenProvider {
    auth: AuthClient,
    refresh_token: Option<String>,
    session: OnceCell<String>,
}

impl TokenProvider {
    pub fn new(auth: AuthClient, refresh_token: Option<String>) -> Self {
        Self {
            auth,
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            session: OnceCell::new(),
        }
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    /// The configured refresh token
    pub fn refresh_token(&self) -> Result<&str> {
        self.refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::MissingRefreshToken.into())
    }

    /// Session-scoped access token, generated on first use
    pub async fn session_token(&self) -> Result<String> {
        let token = self
            .session
            .get_or_try_init(|| async {
                info!("Generating session access token...");
                let refresh_token = self.refresh_token()?;
                let pair = self
                    .auth
                    .generate(refresh_token)
                    .await
                    .inspect_err(|e| error!("Failed to generate token: {}", e))?;
                info!("Session access token generated successfully");
                Ok::<_, anyhow::Error>(pair.access_token)
            })
            .await?;
        Ok(token.clone())
    }

    /// Freshly generated access token
    pub async fn fresh_token(&self) -> Result<String> {
        debug!("Generating fresh access token...");
        let refresh_token = self.refresh_token()?;
        Ok(self.auth.generate(refresh_token).await?.access_token)
    }

    /// Freshly generated token pair, including the rotated refresh token
    pub async fn fresh_pair(&self) -> Result<TokenPair> {
        let refresh_token = self.refresh_token()?;
        self.auth.generate(refresh_token).await
    }
}
