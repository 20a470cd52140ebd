//! OpenAPI schema management
//!
//! Downloads the service's OpenAPI document, caches it on disk and answers
//! structural questions about it.

mod document;
mod manager;

pub use document::{OpenApiDocument, BEARER_SCHEME};
pub use manager::SchemaManager;

#[cfg(test)]
pub(crate) use document::tests as tests_support;

use std::path::PathBuf;
use thiserror::Error;

/// Schema errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Endpoint {0} not found in schema")]
    EndpointNotFound(String),

    #[error("Method {method} not supported for {path}")]
    MethodNotSupported { method: String, path: String },

    #[error("Response {status} not documented for {path}")]
    ResponseNotDocumented { status: u16, path: String },

    #[error("Schema download failed: {0}")]
    Download(String),

    #[error("Schema parse failed: {0}")]
    Parse(String),

    #[error("Invalid response schema: {0}")]
    InvalidSchema(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
