//! Configuration module
//!
//! Settings are resolved from built-in defaults, an optional config file,
//! environment variables and finally command-line flags.

#![allow(dead_code)]

mod env;
mod file;

pub use env::{print_env_help, EnvBuilder, EnvConfig};
pub use file::ConfigFile;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default service under test
pub const DEFAULT_BASE_URL: &str = "https://qa-home-assignment.magmadevs.com";

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the service under test
    pub base_url: String,

    /// Refresh token used to mint access tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Verify TLS certificates
    pub ssl_verify: bool,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Timeout for auth calls in seconds
    pub auth_timeout_secs: u64,

    /// Timeout for the schema download in seconds
    pub schema_timeout_secs: u64,

    /// Directory holding the cached OpenAPI schema
    pub schema_dir: PathBuf,

    /// Directory for session, main and error logs
    pub log_dir: PathBuf,

    /// Directory for discovery reports
    pub report_dir: PathBuf,

    /// Worker pool size for concurrent probes
    pub max_workers: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            refresh_token: None,
            ssl_verify: true,
            request_timeout_secs: 10,
            auth_timeout_secs: 10,
            schema_timeout_secs: 30,
            schema_dir: PathBuf::from("data/schemas"),
            log_dir: PathBuf::from("reports/logs"),
            report_dir: PathBuf::from("test_reports"),
            max_workers: 5,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        let config: Self = if is_yaml(path.as_ref()) {
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?
        } else {
            serde_json::from_str(&content).context("Failed to parse JSON config")?
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = if is_yaml(path.as_ref()) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Overlay values found in the environment
    pub fn with_env(mut self, env: &EnvConfig) -> Self {
        if let Some(url) = &env.base_url {
            self.base_url = url.clone();
        }
        if let Some(token) = &env.refresh_token {
            self.refresh_token = Some(token.clone());
        }
        if let Some(verify) = env.ssl_verify {
            self.ssl_verify = verify;
        }
        if let Some(workers) = env.max_workers {
            self.max_workers = workers;
        }
        self
    }

    /// Refresh token, required by every authenticated probe
    pub fn require_refresh_token(&self) -> Result<&str> {
        self.refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("INITIAL_REFRESH_TOKEN environment variable is required")
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn schema_timeout(&self) -> Duration {
        Duration::from_secs(self.schema_timeout_secs)
    }

    /// Refresh token with all but the first four characters hidden
    pub fn masked_token(&self) -> String {
        match &self.refresh_token {
            Some(t) if t.chars().count() > 4 => {
                format!("{}{}", t.chars().take(4).collect::<String>(), "*".repeat(8))
            }
            Some(_) => "*".repeat(8),
            None => "<not set>".to_string(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            anyhow::bail!("base_url must start with http:// or https://: {}", self.base_url);
        }
        if self.max_workers == 0 {
            anyhow::bail!("max_workers must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }
        Ok(())
    }
}

pub(crate) fn is_yaml(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.ssl_verify);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.schema_timeout_secs, 30);
        assert_eq!(config.schema_dir, PathBuf::from("data/schemas"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_env_overrides() {
        let env = EnvConfig {
            base_url: Some("http://localhost:8080".to_string()),
            refresh_token: Some("refresh-abc".to_string()),
            ssl_verify: Some(false),
            ..Default::default()
        };

        let config = AppConfig::default().with_env(&env);
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.require_refresh_token().unwrap(), "refresh-abc");
        assert!(!config.ssl_verify);
        assert_eq!(config.max_workers, 5);
    }

    #[test]
    fn test_missing_refresh_token() {
        let config = AppConfig::default();
        let err = config.require_refresh_token().unwrap_err();
        assert!(err.to_string().contains("INITIAL_REFRESH_TOKEN"));

        let empty = AppConfig {
            refresh_token: Some(String::new()),
            ..Default::default()
        };
        assert!(empty.require_refresh_token().is_err());
    }

    #[test]
    fn test_masked_token() {
        let config = AppConfig {
            refresh_token: Some("abcdefghijkl".to_string()),
            ..Default::default()
        };
        assert_eq!(config.masked_token(), "abcd********");
        assert_eq!(AppConfig::default().masked_token(), "<not set>");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = AppConfig {
            base_url: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            max_workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = AppConfig {
            max_workers: 12,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.max_workers, 12);
        assert_eq!(loaded.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "base_url: http://127.0.0.1:9000\nssl_verify: false\n").unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.base_url, "http://127.0.0.1:9000");
        assert!(!loaded.ssl_verify);
        assert_eq!(loaded.auth_timeout_secs, 10);
    }
}
