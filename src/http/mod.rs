//! HTTP client module
//!
//! Issues timed requests against the service under test.

mod client;

pub use client::{HttpClient, HttpError, HttpRequest, HttpResponse};
