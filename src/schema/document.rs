//! Queries over a parsed OpenAPI v3 document

use jsonschema::Draft;
use serde_json::{Map, Value};

use super::SchemaError;
use crate::models::TEST_ENDPOINT_PREFIX;

/// Name of the bearer security scheme the service declares
pub const BEARER_SCHEME: &str = "bearerAuth";

/// Parsed OpenAPI document
#[derive(Clone, Debug)]
pub struct OpenApiDocument {
    root: Value,
}

impl OpenApiDocument {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// `openapi` version string, e.g. `3.0.3`
    pub fn version(&self) -> Option<&str> {
        self.root.get("openapi").and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.root.pointer("/info/title").and_then(Value::as_str)
    }

    pub fn api_version(&self) -> Option<&str> {
        self.root.pointer("/info/version").and_then(Value::as_str)
    }

    pub fn has_info(&self) -> bool {
        self.root.get("info").is_some()
    }

    fn paths(&self) -> Option<&Map<String, Value>> {
        self.root.get("paths").and_then(Value::as_object)
    }

    pub fn has_paths(&self) -> bool {
        self.paths().is_some()
    }

    /// Every documented path with its methods, sorted by path
    pub fn operations(&self) -> Vec<(String, Vec<String>)> {
        let mut ops: Vec<_> = self
            .paths()
            .map(|paths| {
                paths
                    .iter()
                    .map(|(path, item)| {
                        let methods = item
                            .as_object()
                            .map(|m| m.keys().map(|k| k.to_uppercase()).collect())
                            .unwrap_or_default();
                        (path.clone(), methods)
                    })
                    .collect()
            })
            .unwrap_or_default();
        ops.sort();
        ops
    }

    /// Operation object at `paths[path][method]`
    pub fn endpoint_schema(&self, path: &str, method: &str) -> Result<&Value, SchemaError> {
        let item = self
            .paths()
            .and_then(|paths| paths.get(path))
            .ok_or_else(|| SchemaError::EndpointNotFound(path.to_string()))?;

        let method = method.to_lowercase();
        item.get(&method)
            .ok_or_else(|| SchemaError::MethodNotSupported {
                method,
                path: path.to_string(),
            })
    }

    pub fn supports_method(&self, path: &str, method: &str) -> bool {
        self.endpoint_schema(path, method).is_ok()
    }

    /// Documented paths under the test prefix, sorted
    pub fn test_endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self
            .paths()
            .map(|paths| {
                paths
                    .keys()
                    .filter(|p| p.starts_with(TEST_ENDPOINT_PREFIX))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        endpoints.sort();
        endpoints
    }

    /// Security scheme declared under `components.securitySchemes`
    pub fn security_scheme(&self, name: &str) -> Option<&Value> {
        self.root
            .pointer("/components/securitySchemes")
            .and_then(|schemes| schemes.get(name))
    }

    /// Whether the operation lists the bearer scheme in its `security` requirements
    pub fn requires_bearer_auth(&self, path: &str, method: &str) -> Result<bool, SchemaError> {
        let op = self.endpoint_schema(path, method)?;
        let security = op
            .get("security")
            .or_else(|| self.root.get("security"))
            .and_then(Value::as_array);

        Ok(security
            .map(|reqs| reqs.iter().any(|req| req.get(BEARER_SCHEME).is_some()))
            .unwrap_or(false))
    }

    fn response(&self, path: &str, method: &str, status: u16) -> Result<&Value, SchemaError> {
        self.endpoint_schema(path, method)?
            .get("responses")
            .and_then(|r| r.get(status.to_string()))
            .ok_or_else(|| SchemaError::ResponseNotDocumented {
                status,
                path: path.to_string(),
            })
    }

    /// Content types documented for a response
    pub fn response_content_types(
        &self,
        path: &str,
        method: &str,
        status: u16,
    ) -> Result<Vec<String>, SchemaError> {
        Ok(self
            .response(path, method, status)?
            .get("content")
            .and_then(Value::as_object)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// JSON schema of the `application/json` body of a response
    pub fn response_schema(
        &self,
        path: &str,
        method: &str,
        status: u16,
    ) -> Result<&Value, SchemaError> {
        self.response(path, method, status)?
            .pointer("/content/application~1json/schema")
            .ok_or_else(|| SchemaError::ResponseNotDocumented {
                status,
                path: path.to_string(),
            })
    }

    /// Validate a 200 body against its documented schema, returning every violation
    pub fn validate_response(
        &self,
        path: &str,
        method: &str,
        body: &Value,
    ) -> Result<Vec<String>, SchemaError> {
        let mut schema = self.response_schema(path, method, 200)?.clone();

        // Local `$ref`s point into components, so carry them along with the subschema.
        if let (Some(obj), Some(components)) = (schema.as_object_mut(), self.root.get("components"))
        {
            obj.entry("components").or_insert_with(|| components.clone());
        }

        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&schema)
            .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;

        Ok(validator.iter_errors(body).map(|e| e.to_string()).collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn sample_document() -> Value {
        let op = |with_data: bool| {
            let schema = if with_data {
                json!({"$ref": "#/components/schemas/CounterResponse"})
            } else {
                json!({"$ref": "#/components/schemas/Envelope"})
            };
            json!({
                "get": {
                    "security": [{"bearerAuth": []}],
                    "responses": {
                        "200": {"content": {"application/json": {"schema": schema}}},
                        "401": {"description": "Unauthorized"}
                    }
                }
            })
        };

        json!({
            "openapi": "3.0.3",
            "info": {"title": "QA Test API", "version": "1.0.0"},
            "paths": {
                "/health": {"get": {"responses": {"200": {"description": "ok"}}}},
                "/api/auth/generate": {"post": {"responses": {"200": {"description": "ok"}}}},
                "/api/test/1": op(false),
                "/api/test/2": op(false),
                "/api/test/3": op(false),
                "/api/test/4": op(false),
                "/api/test/5": op(false),
                "/api/test/6": op(true)
            },
            "components": {
                "securitySchemes": {
                    "bearerAuth": {"type": "http", "scheme": "bearer", "bearerFormat": "JWT"}
                },
                "schemas": {
                    "Envelope": {
                        "type": "object",
                        "required": ["message", "status", "timestamp"],
                        "properties": {
                            "message": {"type": "string"},
                            "status": {"type": "string"},
                            "timestamp": {"type": "string"}
                        }
                    },
                    "CounterResponse": {
                        "allOf": [
                            {"$ref": "#/components/schemas/Envelope"},
                            {
                                "type": "object",
                                "required": ["data"],
                                "properties": {
                                    "data": {
                                        "type": "object",
                                        "required": ["count", "id", "value"],
                                        "properties": {
                                            "count": {"type": "integer"},
                                            "id": {"type": "integer"},
                                            "value": {"type": "integer"}
                                        }
                                    }
                                }
                            }
                        ]
                    }
                }
            }
        })
    }

    #[test]
    fn test_structure_accessors() {
        let doc = OpenApiDocument::new(sample_document());
        assert_eq!(doc.version(), Some("3.0.3"));
        assert_eq!(doc.title(), Some("QA Test API"));
        assert!(doc.has_info());
        assert!(doc.has_paths());
        assert_eq!(doc.operations().len(), 8);
    }

    #[test]
    fn test_endpoint_lookup() {
        let doc = OpenApiDocument::new(sample_document());
        assert!(doc.endpoint_schema("/api/test/1", "GET").is_ok());
        assert!(doc.supports_method("/api/test/1", "get"));
        assert!(!doc.supports_method("/api/test/1", "post"));

        let err = doc.endpoint_schema("/api/test/9", "get").unwrap_err();
        assert_eq!(err.to_string(), "Endpoint /api/test/9 not found in schema");

        let err = doc.endpoint_schema("/api/test/1", "DELETE").unwrap_err();
        assert_eq!(err.to_string(), "Method delete not supported for /api/test/1");
    }

    #[test]
    fn test_test_endpoints_sorted_and_filtered() {
        let doc = OpenApiDocument::new(sample_document());
        let endpoints = doc.test_endpoints();
        assert_eq!(endpoints.len(), 6);
        assert_eq!(endpoints[0], "/api/test/1");
        assert_eq!(endpoints[5], "/api/test/6");
    }

    #[test]
    fn test_security() {
        let doc = OpenApiDocument::new(sample_document());
        let scheme = doc.security_scheme(BEARER_SCHEME).unwrap();
        assert_eq!(scheme["type"], "http");
        assert_eq!(scheme["scheme"], "bearer");
        assert!(doc.requires_bearer_auth("/api/test/3", "get").unwrap());
        assert!(!doc.requires_bearer_auth("/health", "get").unwrap());
    }

    #[test]
    fn test_response_content_types() {
        let doc = OpenApiDocument::new(sample_document());
        let types = doc.response_content_types("/api/test/2", "get", 200).unwrap();
        assert_eq!(types, vec!["application/json".to_string()]);
        assert!(doc.response_schema("/api/test/2", "get", 500).is_err());
    }

    #[test]
    fn test_validate_response_with_refs() {
        let doc = OpenApiDocument::new(sample_document());

        let good = json!({
            "message": "ok", "status": "success", "timestamp": "2024-01-01T00:00:00Z",
            "data": {"count": 1, "id": 2, "value": 3}
        });
        assert!(doc.validate_response("/api/test/6", "get", &good).unwrap().is_empty());

        let bad = json!({
            "message": "ok", "status": "success", "timestamp": "2024-01-01T00:00:00Z",
            "data": {"count": "one", "id": 2}
        });
        let errors = doc.validate_response("/api/test/6", "get", &bad).unwrap();
        assert!(!errors.is_empty());

        let missing = json!({"message": "ok"});
        assert!(!doc.validate_response("/api/test/1", "get", &missing).unwrap().is_empty());
    }
}
