//! reqwest-backed transport

use super::{ApiRequest, BinaryEnvelope, Envelope, RequestBody, Transport, TransportError};
use crate::config::ApiSettings;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{header, Client};
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;

/// Transport over HTTPS
///
/// Holds two clients: `api` with JSON default headers (and the bearer token once authorized)
/// and `objects` with no default headers at all, because pre-signed storage URLs reject
/// requests that carry anything they did not sign.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    timeout: Duration,
    bearer_token: Option<String>,
    api: Client,
    objects: Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            api: build_api_client(timeout, None)?,
            objects: Client::builder().timeout(timeout).build()?,
            base_url,
            timeout,
            bearer_token: None,
        })
    }

    pub fn from_settings(settings: &ApiSettings) -> Result<Self, TransportError> {
        Self::new(&settings.base_url, Duration::from_secs(settings.request_timeout_secs))
    }

    pub fn is_authorized(&self) -> bool {
        self.bearer_token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn build(&self, request: &ApiRequest) -> Result<reqwest::RequestBuilder, String> {
        let builder = self.api.request(request.method.clone(), self.url(&request.path));
        match &request.body {
            RequestBody::Empty => Ok(builder),
            RequestBody::Json(value) => Ok(builder.json(value)),
            RequestBody::Invalid(message) => Err(format!("Could not serialize request body: {}", message)),
        }
    }
}

fn build_api_client(timeout: Duration, bearer_token: Option<&str>) -> Result<Client, TransportError> {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    if let Some(token) = bearer_token {
        let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token))?;
        value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, value);
    }

    Ok(Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()?)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: ApiRequest) -> Envelope {
        debug!("{} {}", request.method, request.path);
        let builder = match self.build(&request) {
            Ok(builder) => builder,
            Err(message) => return Envelope::failure(message),
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("{} {} failed: {}", request.method, request.path, e);
                return Envelope::failure(e.to_string());
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => Envelope::from_response(status, body),
            Err(e) => {
                warn!("Failed to read response body for {}: {}", request.path, e);
                Envelope {
                    has_error: true,
                    status: Some(status),
                    raw_response: Some(e.to_string()),
                    parsed: None,
                }
            }
        }
    }

    async fn call_binary(&self, request: ApiRequest) -> BinaryEnvelope {
        debug!("{} {} (binary)", request.method, request.path);
        let builder = match self.build(&request) {
            Ok(builder) => builder.header(header::ACCEPT, "*/*"),
            Err(message) => return BinaryEnvelope::failure(message),
        };

        match builder.send().await {
            Ok(response) => read_bytes(response).await,
            Err(e) => {
                warn!("{} {} failed: {}", request.method, request.path, e);
                BinaryEnvelope::failure(e.to_string())
            }
        }
    }

    async fn put_object(&self, url: &str, file: &Path, content_length: u64) -> Result<u16, TransportError> {
        let file = tokio::fs::File::open(file).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let response = self
            .objects
            .put(url)
            .header(header::CONTENT_LENGTH, content_length)
            .body(body)
            .send()
            .await?;

        Ok(response.status().as_u16())
    }

    async fn get_object(&self, url: &str) -> BinaryEnvelope {
        match self.objects.get(url).send().await {
            Ok(response) => read_bytes(response).await,
            Err(e) => {
                warn!("Object download failed: {}", e);
                BinaryEnvelope::failure(e.to_string())
            }
        }
    }

    fn with_bearer_token(&self, token: &str) -> Result<Self, TransportError> {
        Ok(Self {
            api: build_api_client(self.timeout, Some(token))?,
            bearer_token: Some(token.to_string()),
            ..self.clone()
        })
    }
}

async fn read_bytes(response: reqwest::Response) -> BinaryEnvelope {
    let status = response.status().as_u16();
    match response.bytes().await {
        Ok(bytes) => BinaryEnvelope::from_response(status, bytes.to_vec()),
        Err(e) => BinaryEnvelope {
            has_error: true,
            status: Some(status),
            raw_response: Some(e.to_string()),
            data: None,
        },
    }
}
