//! Environment variable configuration
//!
//! The service variables (`BASE_URL`, `INITIAL_REFRESH_TOKEN`, `SSL_VERIFY`)
//! are read unprefixed; harness knobs carry the `API_DISCOVERY_` prefix.

use std::env;

/// Prefix for harness-specific variables
const ENV_PREFIX: &str = "API_DISCOVERY";

pub const BASE_URL_VAR: &str = "BASE_URL";
pub const REFRESH_TOKEN_VAR: &str = "INITIAL_REFRESH_TOKEN";
pub const SSL_VERIFY_VAR: &str = "SSL_VERIFY";

/// Configuration read from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Service base URL from BASE_URL
    pub base_url: Option<String>,
    /// Refresh token from INITIAL_REFRESH_TOKEN
    pub refresh_token: Option<String>,
    /// TLS verification from SSL_VERIFY
    pub ssl_verify: Option<bool>,
    /// Config file from API_DISCOVERY_CONFIG
    pub config_file: Option<String>,
    /// Log level from API_DISCOVERY_LOG_LEVEL
    pub log_level: Option<String>,
    /// Worker pool size from API_DISCOVERY_MAX_WORKERS
    pub max_workers: Option<usize>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            base_url: env::var(BASE_URL_VAR).ok().filter(|v| !v.is_empty()),
            refresh_token: env::var(REFRESH_TOKEN_VAR).ok(),
            ssl_verify: env::var(SSL_VERIFY_VAR).ok().map(|v| parse_ssl_verify(&v)),
            config_file: get_env("CONFIG"),
            log_level: get_env("LOG_LEVEL"),
            max_workers: get_env_parse("MAX_WORKERS"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.base_url.is_some()
            || self.refresh_token.is_some()
            || self.ssl_verify.is_some()
            || self.config_file.is_some()
            || self.log_level.is_some()
            || self.max_workers.is_some()
    }

    /// Get base URL with fallback
    pub fn base_url_or(&self, default: &str) -> String {
        self.base_url.clone().unwrap_or_else(|| default.to_string())
    }
}

/// Only a case-insensitive `true` keeps verification on
fn parse_ssl_verify(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Builder for setting environment variables (useful for testing)
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.vars.push((BASE_URL_VAR.to_string(), url.into()));
        self
    }

    pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
        self.vars.push((REFRESH_TOKEN_VAR.to_string(), token.into()));
        self
    }

    pub fn ssl_verify(mut self, value: impl Into<String>) -> Self {
        self.vars.push((SSL_VERIFY_VAR.to_string(), value.into()));
        self
    }

    pub fn max_workers(mut self, workers: usize) -> Self {
        self.vars
            .push((format!("{ENV_PREFIX}_MAX_WORKERS"), workers.to_string()));
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_LOG_LEVEL"), level.into()));
        self
    }

    /// Apply environment variables
    pub fn apply(self) {
        for (key, value) in self.vars {
            env::set_var(key, value);
        }
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        self.apply();

        EnvGuard { previous }
    }
}

impl Default for EnvBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print the environment variables the harness understands
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {BASE_URL_VAR}                  Base URL of the service under test");
    println!("  {REFRESH_TOKEN_VAR}     Refresh token for minting access tokens (required)");
    println!("  {SSL_VERIFY_VAR}                Verify TLS certificates (true/false, default true)");
    println!("  {ENV_PREFIX}_CONFIG        Path to configuration file");
    println!("  {ENV_PREFIX}_LOG_LEVEL     Console log level (trace, debug, info, warn, error)");
    println!("  {ENV_PREFIX}_MAX_WORKERS   Worker pool size for concurrent probes");
    println!();
    println!("Example:");
    println!("  export {REFRESH_TOKEN_VAR}=...");
    println!("  api-discovery run --category discovery");
}
