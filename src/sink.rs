use crate::error::BoxError;
use async_trait::async_trait;

/// One bulk POST: target URI, newline-delimited JSON payload and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkRequest {
    pub uri: String,
    pub payload: String,
    pub headers: Vec<(String, String)>,
}

impl BulkRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Payload split back into its JSON lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.payload.split('\n').filter(|l| !l.is_empty())
    }
}

/// HTTP transport that delivers encoded batches to the ingestion endpoint.
///
/// Implementations only move bytes; encoding, tagging and headers are
/// decided by the [`Sender`](crate::sender::Sender). The engine calls
/// `post` from a forced flush (awaited) or from a detached timer task.
#[async_trait]
pub trait BulkSink: Send + Sync {
    /// Issue a single POST of `request.payload` to `request.uri`.
    ///
    /// **Returns**
    /// - `Ok(())` if the endpoint accepted the batch (2xx).
    /// - `Err(..)` on network failure or any other status. The engine
    ///   drops the batch; it is never retried.
    async fn post(&self, request: BulkRequest) -> Result<(), BoxError>;

    /// Post the fatal-panic batch. Called on a throwaway runtime while the
    /// runtime the sink normally runs on may be blocked, so implementations
    /// holding runtime-bound state (pooled connections) must not reuse it.
    async fn post_fatal(&self, request: BulkRequest) -> Result<(), BoxError> {
        self.post(request).await
    }
}
