//! HTTP-response-shaped values consumed by the response checks.

use crate::error::VerificationUsageError;
use crate::path::JsonPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The view of an HTTP response the verification engine needs.
///
/// Transport is out of scope: hosts adapt whatever client they use.
pub trait HttpResponse {
    /// Numeric status code.
    fn status_code(&self) -> u16;

    /// Elapsed request time in milliseconds.
    fn time_ms(&self) -> u64;

    /// Value of the first header named `name` (case-insensitive).
    fn header(&self, name: &str) -> Option<&str>;

    /// Parsed JSON body; `null` when the body is empty or not JSON.
    fn body(&self) -> &Value;

    /// Whether a header named `name` is present.
    fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Evaluate a path expression against the body.
    fn json_path(&self, path: &str) -> Result<Value, VerificationUsageError> {
        Ok(JsonPath::parse(path)?.query(self.body()))
    }
}

/// A captured response, decoupled from any HTTP client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedResponse {
    /// HTTP status code.
    pub status: u16,

    /// Elapsed time in milliseconds.
    pub time_ms: u64,

    /// Headers in arrival order; names keep their original casing.
    pub headers: Vec<(String, String)>,

    /// Parsed JSON body.
    pub body: Value,

    /// Raw body text as received.
    pub raw_body: String,
}

impl RecordedResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            time_ms: 0,
            headers: Vec::new(),
            body: Value::Null,
            raw_body: String::new(),
        }
    }

    pub fn with_time_ms(mut self, time_ms: u64) -> Self {
        self.time_ms = time_ms;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set a JSON body; the raw text is its serialized form.
    pub fn with_json(mut self, body: Value) -> Self {
        self.raw_body = body.to_string();
        self.body = body;
        self
    }

    /// Set a raw text body, parsing it as JSON when possible.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.body = serde_json::from_str(&text).unwrap_or(Value::Null);
        self.raw_body = text;
        self
    }

    /// The raw body text.
    pub fn body_as_string(&self) -> &str {
        &self.raw_body
    }
}

impl HttpResponse for RecordedResponse {
    fn status_code(&self) -> u16 {
        self.status
    }

    fn time_ms(&self) -> u64 {
        self.time_ms
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn body(&self) -> &Value {
        &self.body
    }
}
