use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::error;

use bananas::config::Config;
use bananas::engine::Engine;
use bananas::host::StandaloneHost;
use bananas::init::{init_tracing_with_config, LayerConfig};
use bananas::noop_sink::NoopSink;

#[tokio::main]
async fn main() {
    let engine = Engine::start(
        Config::new("load-test"),
        Arc::new(NoopSink::default()),
        Arc::new(StandaloneHost),
    )
    .await
    .expect("engine starts");

    let layer_config = LayerConfig {
        enable_stdout: false,
        ..LayerConfig::default()
    };
    init_tracing_with_config(engine.clone(), layer_config).expect("no global subscriber yet");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: buffered {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    // Let a couple of ticks drain the buffer, then ship the rest.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let start = Instant::now();
    engine.shutdown().await;
    println!("shutdown drained in {:?}", start.elapsed());
}
