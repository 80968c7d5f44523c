use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error as StdError;

/// Kind of event a [`Record`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Server,
    Response,
    Error,
}

/// A structured fault: an error value that carries a message and stack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fault {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Extra context attached to the underlying error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Fault {
    pub fn new(message: impl Into<String>) -> Self {
        Fault {
            message: message.into(),
            stack: None,
            data: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Normalize a Rust error. The `source()` chain becomes the stack, one
    /// cause per line.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        let mut fault = Fault::new(err.to_string());
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        if !causes.is_empty() {
            fault.stack = Some(causes.join("\n"));
        }
        fault
    }
}

/// Payload of an `error` field, resolved once when the record is built.
///
/// Serialized untagged: a fault becomes `{message, stack, data?}`, any
/// other value is written unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Failure {
    Fault(Fault),
    Value(Value),
}

impl From<Fault> for Failure {
    fn from(fault: Fault) -> Self {
        Failure::Fault(fault)
    }
}

impl From<Value> for Failure {
    fn from(value: Value) -> Self {
        Failure::Value(value)
    }
}

/// Request-scoped portion of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetail {
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
    pub route_path: String,
    pub method: String,
    pub request: RequestInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestInfo {
    pub id: String,
    /// Receipt time, epoch milliseconds.
    pub received: i64,
    /// Milliseconds between receipt and record construction.
    pub elapsed: i64,
    #[serde(rename = "remoteIP", skip_serializing_if = "Option::is_none")]
    pub remote_ip: Option<String>,
}

/// One normalized unit of telemetry, serialized as a single JSON line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub event: EventKind,
    /// Epoch milliseconds at build time.
    pub timestamp: i64,
    pub host: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub request: Option<RequestDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

impl Record {
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_error(mut self, error: impl Into<Failure>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Prefix this record's tags with the global list, keeping the record's
    /// own tags, in order, after it.
    pub(crate) fn prepend_tags(&mut self, global: &[String]) {
        if global.is_empty() {
            return;
        }
        let own = std::mem::take(&mut self.tags);
        self.tags = global.iter().cloned().chain(own).collect();
    }
}
