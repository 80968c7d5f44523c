use std::sync::Arc;

use async_trait::async_trait;
use bananas::{
    config::Config,
    engine::Engine,
    error::BoxError,
    host::{LogPayload, RequestContext, StandaloneHost},
    record::Fault,
    sink::{BulkRequest, BulkSink},
};

/// Example of shipping batches somewhere other than a bulk HTTP endpoint
/// by implementing `BulkSink` directly. Imagine this writes to some
/// proprietary store this crate has no built-in sink for.
struct MyCustomStoreSink;

#[async_trait]
impl BulkSink for MyCustomStoreSink {
    async fn post(&self, request: BulkRequest) -> Result<(), BoxError> {
        // Here you would call your own client library.
        for line in request.lines() {
            println!("[my-custom-store] {}", line);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let sink: Arc<dyn BulkSink> = Arc::new(MyCustomStoreSink);
    let engine = Engine::start(Config::new("unused"), sink, Arc::new(StandaloneHost))
        .await
        .expect("engine starts");

    engine.log(["example"], LogPayload::Data(serde_json::json!({"backend": "custom"})));

    let ctx = RequestContext::new("req-1", "post", "/orders/7")
        .with_route("/orders/{id}")
        .with_param("id", "7");
    engine
        .request_error(&ctx, Fault::new("simulated failure"))
        .expect("no credential extractor configured");
    engine
        .response(&ctx.with_response(500, Some(serde_json::json!({"statusCode": 500}))))
        .expect("no credential extractor configured");

    engine.shutdown().await;
}
