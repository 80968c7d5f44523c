//! Surface of the host application the engine observes and drives.

use crate::record::Failure;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// What the host knows about one request, as seen by the engine.
///
/// Hosts fill this in from their own request type when they report a
/// request error or a completed response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub id: String,
    pub path: String,
    /// Route pattern that matched, e.g. `/users/{id}`.
    pub route_path: String,
    pub method: String,
    pub query: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
    /// Receipt time, epoch milliseconds.
    pub received: i64,
    /// Value of the `x-forwarded-for` header, if any.
    pub remote_ip: Option<String>,
    /// Whether the host attached credentials to the request.
    pub authenticated: bool,
    /// Per-route opt-out taken from the route's own metadata.
    pub route_excluded: bool,
    /// Final response status code.
    pub status_code: u16,
    /// Final response body, used as the `error` field for 4xx/5xx.
    pub response_body: Option<Value>,
}

impl RequestContext {
    /// Start a context for a request received now. The route pattern
    /// defaults to the path.
    pub fn new(id: impl Into<String>, method: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: id.into(),
            route_path: path.clone(),
            path,
            method: method.into(),
            received: Utc::now().timestamp_millis(),
            status_code: 200,
            ..Self::default()
        }
    }

    pub fn with_route(mut self, route_path: impl Into<String>) -> Self {
        self.route_path = route_path.into();
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_received(mut self, received: i64) -> Self {
        self.received = received;
        self
    }

    pub fn with_remote_ip(mut self, remote_ip: impl Into<String>) -> Self {
        self.remote_ip = Some(remote_ip.into());
        self
    }

    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }

    pub fn excluded(mut self) -> Self {
        self.route_excluded = true;
        self
    }

    pub fn with_response(mut self, status_code: u16, body: Option<Value>) -> Self {
        self.status_code = status_code;
        self.response_body = body;
        self
    }
}

/// Payload of a generic log event.
#[derive(Debug, Clone, PartialEq)]
pub enum LogPayload {
    Empty,
    /// Arbitrary structured data, shipped as the record's `data` field.
    Data(Value),
    /// An error, shipped as the record's `error` field.
    Error(Failure),
}

impl From<Value> for LogPayload {
    fn from(value: Value) -> Self {
        LogPayload::Data(value)
    }
}

/// Process-level control the engine needs from its host.
///
/// The host is expected to call [`Engine::shutdown`] from its own post-stop
/// lifecycle and await it before its stop completes.
///
/// [`Engine::shutdown`]: crate::engine::Engine::shutdown
#[async_trait]
pub trait Host: Send + Sync {
    /// Stop the host, giving in-flight work at most `timeout` before the
    /// host forces termination. Called on signal-triggered shutdown.
    async fn stop(&self, timeout: Duration);

    /// Terminate the process. Called after a signal-triggered stop with
    /// code 0 and after an uncaught panic with code 1.
    fn exit(&self, code: i32) {
        std::process::exit(code)
    }
}

/// Host for applications that have no stop sequence of their own: stopping
/// is a no-op and the engine shuts itself down before exiting.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandaloneHost;

#[async_trait]
impl Host for StandaloneHost {
    async fn stop(&self, _timeout: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_context_defaults_route_to_path() {
        let ctx = RequestContext::new("1", "get", "/a");
        assert_eq!(ctx.route_path, "/a");
        assert_eq!(ctx.status_code, 200);
        assert!(!ctx.authenticated);
        assert!(!ctx.route_excluded);
        assert!(ctx.received > 0);
    }

    #[test]
    fn setters_fill_response_and_flags() {
        let ctx = RequestContext::new("1", "post", "/users/7")
            .with_route("/users/{id}")
            .with_param("id", "7")
            .with_remote_ip("10.1.1.1")
            .authenticated()
            .excluded()
            .with_response(500, Some(json!({"error": "Internal Server Error"})));

        assert_eq!(ctx.route_path, "/users/{id}");
        assert_eq!(ctx.params["id"], "7");
        assert_eq!(ctx.remote_ip.as_deref(), Some("10.1.1.1"));
        assert!(ctx.authenticated && ctx.route_excluded);
        assert_eq!(ctx.status_code, 500);
        assert!(ctx.response_body.is_some());
    }
}
