//! Download and on-disk caching of the OpenAPI document

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use super::{OpenApiDocument, SchemaError};
use crate::http::HttpClient;
use crate::models::OPENAPI_YAML_ENDPOINT;

/// Cached schema file name inside the schema directory
pub const SCHEMA_FILE_NAME: &str = "openapi_schema.json";

/// Fetches the YAML OpenAPI document and caches it as pretty JSON
pub struct SchemaManager {
    client: HttpClient,
    schema_dir: PathBuf,
    schema_file: PathBuf,
}

impl SchemaManager {
    /// Create a manager; the schema directory is created if missing
    pub fn new(client: HttpClient, schema_dir: impl Into<PathBuf>) -> Result<Self, SchemaError> {
        let schema_dir = schema_dir.into();
        std::fs::create_dir_all(&schema_dir).map_err(|e| SchemaError::Io {
            path: schema_dir.clone(),
            source: e,
        })?;
        let schema_file = schema_dir.join(SCHEMA_FILE_NAME);

        Ok(Self {
            client,
            schema_dir,
            schema_file,
        })
    }

    pub fn schema_file(&self) -> &Path {
        &self.schema_file
    }

    pub fn is_cached(&self) -> bool {
        self.schema_file.exists()
    }

    /// Download the schema unless a cached copy exists (or `force` is set).
    ///
    /// A cached file is returned as-is without any freshness check.
    pub async fn download_schema(&self, force: bool) -> Result<PathBuf, SchemaError> {
        if self.is_cached() && !force {
            debug!("Using cached schema at {}", self.schema_file.display());
            return Ok(self.schema_file.clone());
        }

        info!("Downloading OpenAPI schema from {}", self.client.build_url(OPENAPI_YAML_ENDPOINT));

        let response = self
            .client
            .get(OPENAPI_YAML_ENDPOINT)
            .await
            .map_err(|e| SchemaError::Download(e.to_string()))?;

        if !response.is_success() {
            return Err(SchemaError::Download(format!(
                "HTTP {} from {}",
                response.status_code, OPENAPI_YAML_ENDPOINT
            )));
        }

        let document: Value = serde_yaml::from_str(&response.body)
            .map_err(|e| SchemaError::Parse(e.to_string()))?;
        let json =
            serde_json::to_string_pretty(&document).map_err(|e| SchemaError::Parse(e.to_string()))?;

        std::fs::write(&self.schema_file, json).map_err(|e| SchemaError::Io {
            path: self.schema_file.clone(),
            source: e,
        })?;

        info!("Schema saved to {}", self.schema_file.display());
        Ok(self.schema_file.clone())
    }

    /// Load the cached schema, downloading it first if absent
    pub async fn get_schema(&self) -> Result<OpenApiDocument, SchemaError> {
        if !self.is_cached() {
            self.download_schema(false).await?;
        }

        let content = std::fs::read_to_string(&self.schema_file).map_err(|e| SchemaError::Io {
            path: self.schema_file.clone(),
            source: e,
        })?;
        let root: Value =
            serde_json::from_str(&content).map_err(|e| SchemaError::Parse(e.to_string()))?;

        Ok(OpenApiDocument::new(root))
    }

    /// Operation object for `path` and `method` (method is case-insensitive)
    pub async fn get_endpoint_schema(&self, path: &str, method: &str) -> Result<Value, SchemaError> {
        let document = self.get_schema().await?;
        document.endpoint_schema(path, method).cloned()
    }

    /// Sorted list of documented `/api/test/` paths
    pub async fn get_all_test_endpoints(&self) -> Result<Vec<String>, SchemaError> {
        Ok(self.get_schema().await?.test_endpoints())
    }
}
