//! Scripted in-memory transport for tests

use super::{ApiRequest, BinaryEnvelope, Envelope, Method, RequestBody, Transport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Canned reply for one route
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Json(u16, Value),
    Text(u16, String),
    Bytes(u16, Vec<u8>),
    NetworkError,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedPut {
    pub url: String,
    pub file: PathBuf,
    pub content_length: u64,
}

#[derive(Debug, Default)]
struct Script {
    routes: HashMap<String, VecDeque<Reply>>,
    calls: Vec<RecordedCall>,
    puts: Vec<RecordedPut>,
    put_status: Option<u16>,
    put_open_fails: bool,
    cancel_after: Option<(String, CancellationToken)>,
    object_gets: Vec<String>,
}

/// Routes are keyed by `"METHOD path"`. Replies queued on a route are consumed in order and the
/// last one repeats; unscripted routes answer 404.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeTransport {
    script: Arc<Mutex<Script>>,
    bearer_token: Option<String>,
}

fn key(method: &Method, path: &str) -> String {
    format!("{} {}", method, path)
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.script
            .lock()
            .unwrap()
            .routes
            .entry(key(&method, path))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn json(&self, method: Method, path: &str, body: Value) -> &Self {
        self.on(method, path, Reply::Json(200, body))
    }

    pub fn set_put_status(&self, status: u16) {
        self.script.lock().unwrap().put_status = Some(status);
    }

    /// Make the next PUTs fail as if the local file could not be opened
    pub fn fail_put_open(&self) {
        self.script.lock().unwrap().put_open_fails = true;
    }

    /// Cancel `token` when a call to `method path` is made; that call is still answered
    pub fn cancel_after(&self, method: Method, path: &str, token: CancellationToken) {
        self.script.lock().unwrap().cancel_after = Some((key(&method, path), token));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().unwrap().calls.clone()
    }

    /// `"METHOD path"` for every API call, in order
    pub fn call_log(&self) -> Vec<String> {
        self.calls().iter().map(|c| key(&c.method, &c.path)).collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        let wanted = key(&method, path);
        self.call_log().iter().filter(|k| **k == wanted).count()
    }

    pub fn puts(&self) -> Vec<RecordedPut> {
        self.script.lock().unwrap().puts.clone()
    }

    pub fn object_gets(&self) -> Vec<String> {
        self.script.lock().unwrap().object_gets.clone()
    }

    fn next_reply(&self, method: &Method, path: &str) -> Option<Reply> {
        let mut script = self.script.lock().unwrap();
        let queue = script.routes.get_mut(&key(method, path))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    fn record(&self, request: &ApiRequest) {
        let body = match &request.body {
            RequestBody::Json(value) => Some(value.clone()),
            _ => None,
        };
        let mut script = self.script.lock().unwrap();
        if let Some((route, token)) = &script.cancel_after {
            if *route == key(&request.method, &request.path) {
                token.cancel();
            }
        }
        script.calls.push(RecordedCall {
            method: request.method.clone(),
            path: request.path.clone(),
            body,
            bearer_token: self.bearer_token.clone(),
        });
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn call(&self, request: ApiRequest) -> Envelope {
        self.record(&request);
        match self.next_reply(&request.method, &request.path) {
            Some(Reply::Json(status, value)) => Envelope::from_response(status, value.to_string()),
            Some(Reply::Text(status, text)) => Envelope::from_response(status, text),
            Some(Reply::Bytes(status, bytes)) => {
                Envelope::from_response(status, String::from_utf8_lossy(&bytes).into_owned())
            }
            Some(Reply::NetworkError) => Envelope::failure("connection refused"),
            None => Envelope::from_response(404, String::new()),
        }
    }

    async fn call_binary(&self, request: ApiRequest) -> BinaryEnvelope {
        self.record(&request);
        match self.next_reply(&request.method, &request.path) {
            Some(Reply::Bytes(status, bytes)) => BinaryEnvelope::from_response(status, bytes),
            Some(Reply::Text(status, text)) => BinaryEnvelope::from_response(status, text.into_bytes()),
            Some(Reply::Json(status, value)) => BinaryEnvelope::from_response(status, value.to_string().into_bytes()),
            Some(Reply::NetworkError) => BinaryEnvelope::failure("connection refused"),
            None => BinaryEnvelope::from_response(404, Vec::new()),
        }
    }

    async fn put_object(&self, url: &str, file: &Path, content_length: u64) -> Result<u16, TransportError> {
        let mut script = self.script.lock().unwrap();
        script.puts.push(RecordedPut {
            url: url.to_string(),
            file: file.to_path_buf(),
            content_length,
        });
        if script.put_open_fails {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "file removed before upload",
            )));
        }
        Ok(script.put_status.unwrap_or(200))
    }

    async fn get_object(&self, url: &str) -> BinaryEnvelope {
        self.script.lock().unwrap().object_gets.push(url.to_string());
        match self.next_reply(&Method::GET, url) {
            Some(Reply::Bytes(status, bytes)) => BinaryEnvelope::from_response(status, bytes),
            Some(Reply::Text(status, text)) => BinaryEnvelope::from_response(status, text.into_bytes()),
            Some(Reply::Json(status, value)) => BinaryEnvelope::from_response(status, value.to_string().into_bytes()),
            Some(Reply::NetworkError) => BinaryEnvelope::failure("connection refused"),
            None => BinaryEnvelope::from_response(404, Vec::new()),
        }
    }

    fn with_bearer_token(&self, token: &str) -> Result<Self, TransportError> {
        Ok(Self {
            script: Arc::clone(&self.script),
            bearer_token: Some(token.to_string()),
        })
    }
}
