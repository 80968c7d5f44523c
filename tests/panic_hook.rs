//! Panic hook behavior. Lives in its own test binary since the hook is
//! process-global.

mod common;

use bananas::config::Config;
use std::thread;
use std::time::Duration;

#[tokio::test]
async fn panic_is_flushed_then_exits_with_one() {
    let config = Config::new("abc")
        .with_interval(Duration::from_secs(3600))
        .with_stop_timeout(Duration::from_secs(5))
        .with_uncaught_exception(true);
    let (engine, sink, host) = common::start(config).await;

    let outcome = thread::spawn(|| panic!("worker exploded")).join();
    assert!(outcome.is_err());

    assert_eq!(host.wait_for_exit(Duration::from_secs(5)).await, Some(1));
    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["event"], "error");
    assert_eq!(records[1]["tags"], serde_json::json!(["bananas", "uncaught", "error"]));
    assert_eq!(records[1]["error"]["message"], "worker exploded");
    assert!(records[1]["error"]["stack"]
        .as_str()
        .unwrap()
        .starts_with("panicked at"));

    // Once shut down the hook is gone: further panics are not reported.
    engine.shutdown().await;
    let shipped = sink.records().len();
    let _ = thread::spawn(|| panic!("after shutdown")).join();
    assert_eq!(sink.records().len(), shipped);
    assert_eq!(engine.pending(), 0);
}
