//! HTTP calling convention shared by every remote operation
//!
//! The [`Transport`] trait is the seam between the control patterns (pagination, upload,
//! polling, the workflow) and the network. [`HttpTransport`] is the real implementation.

mod envelope;
mod http;
#[cfg(test)]
pub(crate) mod fake;

pub use envelope::{BinaryEnvelope, Envelope, Processed};
pub use http::HttpTransport;

use async_trait::async_trait;
pub use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Errors raised while building or using a transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

/// Body of an API request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Serialization failed; the transport reports it as a failed envelope without sending
    Invalid(String),
}

/// One call against the API base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, including any query string
    pub path: String,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Attach a JSON body
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = match serde_json::to_value(body) {
            Ok(value) => RequestBody::Json(value),
            Err(e) => RequestBody::Invalid(e.to_string()),
        };
        self
    }
}

/// Remote calling convention
///
/// API calls go to the configured base URL and carry the bearer token once authorized.
/// Object-storage calls take absolute pre-signed URLs and carry no extra headers.
#[async_trait]
pub trait Transport: Send + Sync {
    /// JSON exchange against the API
    async fn call(&self, request: ApiRequest) -> Envelope;

    /// Exchange whose response payload is raw bytes
    async fn call_binary(&self, request: ApiRequest) -> BinaryEnvelope;

    /// Stream a local file to a pre-signed URL with an explicit content length.
    /// Returns the HTTP status of the PUT.
    async fn put_object(&self, url: &str, file: &Path, content_length: u64) -> Result<u16, TransportError>;

    /// Fetch bytes from a pre-signed URL
    async fn get_object(&self, url: &str) -> BinaryEnvelope;

    /// Rebuild this transport so every subsequent API call carries `Authorization: Bearer <token>`
    fn with_bearer_token(&self, token: &str) -> Result<Self, TransportError>
    where
        Self: Sized;
}
