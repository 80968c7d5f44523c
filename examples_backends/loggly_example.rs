use std::sync::Arc;

use bananas::{
    config::Config,
    engine::Engine,
    host::StandaloneHost,
    http::HttpSink,
    init::init_tracing,
};
use tracing::{error, info};

/// Ships to a Loggly-compatible bulk endpoint configured from the
/// environment, e.g.
///
/// ```bash
/// BANANAS_TOKEN=... BANANAS_TAGS=demo,local BANANAS_SIGNALS=true \
///     cargo run --example loggly_example
/// ```
#[tokio::main]
async fn main() {
    let config = Config::from_env().expect("valid BANANAS_* environment");
    let engine = Engine::start(config, Arc::new(HttpSink::new()), Arc::new(StandaloneHost))
        .await
        .expect("engine starts");

    init_tracing(engine.clone()).expect("no global subscriber yet");

    info!(user = "demo", "loggly example started");
    error!(order = 42, "simulated payment failure");

    engine.shutdown().await;
}
