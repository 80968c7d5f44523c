use crate::config::Config;
use crate::record::Record;
use crate::sink::{BulkRequest, BulkSink};
use serde_json::json;
use std::sync::Arc;

/// Outcome of one send attempt.
///
/// Failures are reported here and nowhere else: they are not logged,
/// retried or re-queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Nothing was pending; no request was made.
    Skipped,
    /// The endpoint accepted the batch.
    Sent,
    /// The request failed; the batch is gone.
    Failed,
}

/// Encodes batches as newline-delimited JSON and hands them to a
/// [`BulkSink`].
#[derive(Clone)]
pub struct Sender {
    sink: Arc<dyn BulkSink>,
    uri: String,
    tag_header: Option<String>,
}

impl Sender {
    pub fn new(sink: Arc<dyn BulkSink>, config: &Config) -> Self {
        Self {
            sink,
            uri: config.uri(),
            tag_header: Some(config.global_tags())
                .filter(|tags| !tags.is_empty())
                .map(|tags| tags.join(",")),
        }
    }

    /// Headers sent with every batch.
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        if let Some(tags) = &self.tag_header {
            headers.push(("x-loggly-tag".to_string(), tags.clone()));
        }
        headers
    }

    /// Post `records` as one payload. An empty batch makes no request.
    pub async fn send(&self, records: &[Record]) -> Delivery {
        if records.is_empty() {
            return Delivery::Skipped;
        }

        match self.sink.post(self.request(records)).await {
            Ok(()) => Delivery::Sent,
            Err(_) => Delivery::Failed,
        }
    }

    /// Like [`send`](Self::send), through [`BulkSink::post_fatal`].
    pub async fn send_fatal(&self, records: &[Record]) -> Delivery {
        if records.is_empty() {
            return Delivery::Skipped;
        }

        match self.sink.post_fatal(self.request(records)).await {
            Ok(()) => Delivery::Sent,
            Err(_) => Delivery::Failed,
        }
    }

    fn request(&self, records: &[Record]) -> BulkRequest {
        BulkRequest {
            uri: self.uri.clone(),
            payload: encode_batch(records),
            headers: self.headers(),
        }
    }
}

/// One JSON document per record, joined with `\n`.
pub fn encode_batch(records: &[Record]) -> String {
    records
        .iter()
        .map(encode_record)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize a single record. A record that cannot be serialized is
/// replaced by its envelope plus a description of the failure, so one bad
/// record never sinks the batch.
pub fn encode_record(record: &Record) -> String {
    serde_json::to_string(record).unwrap_or_else(|err| fallback(record, &err.to_string()))
}

fn fallback(record: &Record, reason: &str) -> String {
    json!({
        "event": record.event,
        "timestamp": record.timestamp,
        "host": record.host,
        "tags": record.tags,
        "error": { "message": format!("unserializable record: {reason}") },
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::envelope;
    use crate::noop_sink::MemorySink;
    use crate::record::EventKind;
    use serde_json::Value;

    fn sender(sink: &MemorySink, config: &Config) -> Sender {
        Sender::new(Arc::new(sink.clone()), config)
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        let sink = MemorySink::new();
        let delivery = sender(&sink, &Config::new("abc")).send(&[]).await;
        assert_eq!(delivery, Delivery::Skipped);
        assert!(sink.requests().is_empty());
    }

    #[tokio::test]
    async fn batch_is_one_post_of_ndjson() {
        let sink = MemorySink::new();
        let records = vec![
            envelope(EventKind::Server).with_tags(["one"]),
            envelope(EventKind::Error).with_tags(["two"]),
        ];

        let delivery = sender(&sink, &Config::new("abc")).send(&records).await;
        assert_eq!(delivery, Delivery::Sent);

        let requests = sink.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.uri, "https://logs-01.loggly.com/bulk/abc");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("x-loggly-tag"), None);

        let lines: Vec<Value> = request
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "server");
        assert_eq!(lines[1]["event"], "error");
        assert!(!request.payload.ends_with('\n'));
    }

    #[tokio::test]
    async fn tag_header_joins_global_tags() {
        let sink = MemorySink::new();
        let config = Config::new("abc").with_tags(["prod", "api"]);
        sender(&sink, &config)
            .send(&[envelope(EventKind::Server)])
            .await;

        assert_eq!(sink.requests()[0].header("x-loggly-tag"), Some("prod,api"));
    }

    #[tokio::test]
    async fn empty_tag_list_sends_no_tag_header() {
        let sink = MemorySink::new();
        let mut config = Config::new("abc");
        config.tags = Some(Vec::new());
        sender(&sink, &config)
            .send(&[envelope(EventKind::Server)])
            .await;

        assert_eq!(sink.requests()[0].header("x-loggly-tag"), None);
    }

    #[tokio::test]
    async fn transport_failure_is_absorbed() {
        let sink = MemorySink::failing();
        let delivery = sender(&sink, &Config::new("abc"))
            .send(&[envelope(EventKind::Server)])
            .await;
        assert_eq!(delivery, Delivery::Failed);
    }

    #[test]
    fn fallback_keeps_envelope() {
        let record = envelope(EventKind::Response).with_tags(["x"]);
        let line: Value = serde_json::from_str(&fallback(&record, "cycle")).unwrap();
        assert_eq!(line["event"], "response");
        assert_eq!(line["tags"][0], "x");
        assert_eq!(line["host"], record.host.as_str());
        assert!(line["error"]["message"].as_str().unwrap().contains("cycle"));
    }
}
