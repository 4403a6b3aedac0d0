//! Uniform outcome wrappers for a single remote call

use serde_json::{Map, Value};
use std::fmt;

/// Outcome of one JSON exchange with the remote API
///
/// `has_error` reflects only the transport/status classification. A successful call whose body
/// is not a JSON object still has `has_error == false` but `parsed == None`, so callers check for
/// the fields they need before treating the call as a domain success.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub has_error: bool,
    /// HTTP status, absent when the request never got a response
    pub status: Option<u16>,
    pub raw_response: Option<String>,
    pub parsed: Option<Map<String, Value>>,
}

impl Envelope {
    /// Build from a completed HTTP exchange
    pub fn from_response(status: u16, body: String) -> Self {
        let has_error = status >= 400;
        let parsed = if has_error {
            None
        } else {
            serde_json::from_str::<Map<String, Value>>(&body).ok()
        };

        Self {
            has_error,
            status: Some(status),
            raw_response: Some(body),
            parsed,
        }
    }

    /// A call that failed before (or instead of) an HTTP response
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            has_error: true,
            status: None,
            raw_response: Some(message.into()),
            parsed: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.parsed.as_ref()?.get(name)
    }

    /// Integer field, accepting either a JSON number or a numeric string
    pub fn field_i64(&self, name: &str) -> Option<i64> {
        match self.field(name)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String field; non-string scalars are rendered with their JSON text
    pub fn field_str(&self, name: &str) -> Option<String> {
        match self.field(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn field_bool(&self, name: &str) -> Option<bool> {
        match self.field(name)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().to_ascii_lowercase().parse().ok(),
            _ => None,
        }
    }

    /// Short description for log lines
    pub fn describe(&self) -> String {
        match (self.status, self.raw_response.as_deref()) {
            (Some(status), Some(body)) if !body.is_empty() => format!("HTTP {}: {}", status, body),
            (Some(status), _) => format!("HTTP {}", status),
            (None, Some(message)) => message.to_string(),
            (None, None) => "no response".to_string(),
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Outcome of an exchange whose payload is raw bytes (report and file downloads)
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryEnvelope {
    pub has_error: bool,
    pub status: Option<u16>,
    pub raw_response: Option<String>,
    pub data: Option<Vec<u8>>,
}

impl BinaryEnvelope {
    pub fn from_response(status: u16, body: Vec<u8>) -> Self {
        if status >= 400 {
            return Self {
                has_error: true,
                status: Some(status),
                raw_response: Some(String::from_utf8_lossy(&body).into_owned()),
                data: None,
            };
        }

        if body.is_empty() {
            return Self {
                has_error: true,
                status: Some(status),
                raw_response: Some("No data found".to_string()),
                data: None,
            };
        }

        Self {
            has_error: false,
            status: Some(status),
            raw_response: None,
            data: Some(body),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            has_error: true,
            status: None,
            raw_response: Some(message.into()),
            data: None,
        }
    }

    pub fn describe(&self) -> String {
        match (self.status, self.raw_response.as_deref()) {
            (Some(status), Some(body)) => format!("HTTP {}: {}", status, body),
            (Some(status), None) => format!("HTTP {}", status),
            (None, Some(message)) => message.to_string(),
            (None, None) => "no response".to_string(),
        }
    }
}

impl fmt::Display for BinaryEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Result of a remote operation: the envelope plus, on domain success, the extracted value
#[derive(Debug, Clone, PartialEq)]
pub enum Processed<R, E = Envelope> {
    Success { envelope: E, value: R },
    Failure { envelope: E },
}

impl<R, E> Processed<R, E> {
    pub fn success(envelope: E, value: R) -> Self {
        Processed::Success { envelope, value }
    }

    pub fn failure(envelope: E) -> Self {
        Processed::Failure { envelope }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Processed::Success { .. })
    }

    pub fn value(&self) -> Option<&R> {
        match self {
            Processed::Success { value, .. } => Some(value),
            Processed::Failure { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<R> {
        match self {
            Processed::Success { value, .. } => Some(value),
            Processed::Failure { .. } => None,
        }
    }

    pub fn envelope(&self) -> &E {
        match self {
            Processed::Success { envelope, .. } | Processed::Failure { envelope } => envelope,
        }
    }

    pub fn into_parts(self) -> (E, Option<R>) {
        match self {
            Processed::Success { envelope, value } => (envelope, Some(value)),
            Processed::Failure { envelope } => (envelope, None),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(R) -> U) -> Processed<U, E> {
        match self {
            Processed::Success { envelope, value } => Processed::Success {
                envelope,
                value: f(value),
            },
            Processed::Failure { envelope } => Processed::Failure { envelope },
        }
    }
}

impl<R> Processed<R, Envelope> {
    /// Succeeds only if the call succeeded and `extract` finds the required field(s)
    pub fn extract(envelope: Envelope, extract: impl FnOnce(&Envelope) -> Option<R>) -> Self {
        if envelope.has_error {
            return Processed::Failure { envelope };
        }
        match extract(&envelope) {
            Some(value) => Processed::Success { envelope, value },
            None => Processed::Failure { envelope },
        }
    }
}

impl Processed<(), Envelope> {
    /// For calls with no required response field
    pub fn acknowledged(envelope: Envelope) -> Self {
        Self::extract(envelope, |_| Some(()))
    }
}
