use crate::error::BoxError;
use crate::sink::{BulkRequest, BulkSink};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

/// A sink that simply drops all batches.
///
/// Useful for measuring the overhead of the engine itself without any
/// external I/O.
#[derive(Clone, Debug, Default)]
pub struct NoopSink;

#[async_trait]
impl BulkSink for NoopSink {
    async fn post(&self, _request: BulkRequest) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A sink that keeps every request it receives in memory.
///
/// Clones share the same storage, so a test can hand one clone to the
/// engine and inspect the other. A failing sink still records the attempt.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    requests: Arc<Mutex<Vec<BulkRequest>>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every post after recording it.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<BulkRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every delivered record, parsed back from the payload lines, in
    /// delivery order.
    pub fn records(&self) -> Vec<Value> {
        self.requests()
            .iter()
            .flat_map(|r| {
                r.lines()
                    .filter_map(|line| serde_json::from_str(line).ok())
                    .collect::<Vec<Value>>()
            })
            .collect()
    }

    /// Tags of every delivered record, in delivery order.
    pub fn tags(&self) -> Vec<Vec<String>> {
        self.records()
            .iter()
            .map(|r| {
                r["tags"]
                    .as_array()
                    .map(|tags| {
                        tags.iter()
                            .filter_map(|t| t.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect()
    }
}

#[async_trait]
impl BulkSink for MemorySink {
    async fn post(&self, request: BulkRequest) -> Result<(), BoxError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        if self.fail {
            Err("memory sink configured to fail".into())
        } else {
            Ok(())
        }
    }
}
