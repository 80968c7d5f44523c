//! Common test host and helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bananas::config::Config;
use bananas::engine::{Engine, WeakEngine};
use bananas::noop_sink::MemorySink;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Host double: its stop sequence runs the engine's shutdown like a real
/// post-stop hook would, and `exit` records the code instead of exiting.
pub struct TestHost {
    engine: Mutex<Option<WeakEngine>>,
    exit_code: AtomicI32,
    stops: AtomicUsize,
    exited: Notify,
}

impl TestHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            engine: Mutex::new(None),
            exit_code: AtomicI32::new(-1),
            stops: AtomicUsize::new(0),
            exited: Notify::new(),
        })
    }

    pub fn attach(&self, engine: &Engine) {
        *self.engine.lock().unwrap() = Some(engine.downgrade());
    }

    /// Exit code passed to `exit`, if it was called.
    pub fn exit_code(&self) -> Option<i32> {
        match self.exit_code.load(Ordering::SeqCst) {
            -1 => None,
            code => Some(code),
        }
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub async fn wait_for_exit(&self, limit: Duration) -> Option<i32> {
        let notified = self.exited.notified();
        if let Some(code) = self.exit_code() {
            return Some(code);
        }
        let _ = tokio::time::timeout(limit, notified).await;
        self.exit_code()
    }
}

#[async_trait]
impl bananas::host::Host for TestHost {
    async fn stop(&self, _timeout: Duration) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        let engine = self.engine.lock().unwrap().clone();
        if let Some(engine) = engine.and_then(|e| e.upgrade()) {
            engine.shutdown().await;
        }
    }

    fn exit(&self, code: i32) {
        self.exit_code.store(code, Ordering::SeqCst);
        self.exited.notify_waiters();
    }
}

/// Start an engine wired to a fresh [`MemorySink`] and [`TestHost`].
pub async fn start(config: Config) -> (Engine, MemorySink, Arc<TestHost>) {
    let sink = MemorySink::new();
    let host = TestHost::new();
    let engine = Engine::start(config, Arc::new(sink.clone()), host.clone())
        .await
        .expect("engine starts");
    host.attach(&engine);
    (engine, sink, host)
}

pub fn tags(list: &[&[&str]]) -> Vec<Vec<String>> {
    list.iter()
        .map(|t| t.iter().map(|s| s.to_string()).collect())
        .collect()
}
