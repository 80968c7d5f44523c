use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;

use bananas::config::Config;
use bananas::engine::Engine;
use bananas::host::{LogPayload, RequestContext, StandaloneHost};
use bananas::noop_sink::NoopSink;
use serde_json::json;

/// Drives the engine directly from several producer tasks with a short
/// flush interval, mixing log events and responses.
#[tokio::main]
async fn main() {
    let config = Config::new("load-test")
        .with_interval(Duration::from_millis(200))
        .with_tags(["load", "custom"])
        .with_exclude(["/health"]);

    let engine = Engine::start(config, Arc::new(NoopSink::default()), Arc::new(StandaloneHost))
        .await
        .expect("engine starts");

    let producers: u64 = 8;
    let per_producer: u64 = 25_000;
    let start = Instant::now();

    let mut tasks = Vec::new();
    for p in 0..producers {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..per_producer {
                if i % 2 == 0 {
                    engine.log(["load"], LogPayload::Data(json!({"producer": p, "i": i})));
                } else {
                    let path = if i % 10 == 1 { "/health" } else { "/orders" };
                    let ctx = RequestContext::new(format!("{p}-{i}"), "get", path);
                    let _ = engine.response(&ctx);
                }
            }
        }));
    }
    for task in tasks {
        let _ = task.await;
    }

    let n = producers * per_producer;
    let elapsed = start.elapsed();
    println!("custom config: reported {} events in {:?} (~{:.0} ev/s), {} pending",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        engine.pending()
    );

    tokio::time::sleep(Duration::from_millis(500)).await;
    engine.shutdown().await;
}
