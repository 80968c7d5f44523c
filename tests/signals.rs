//! Termination signal handling against a real SIGTERM. Own test binary so
//! the signal only reaches this process's listeners.
#![cfg(unix)]

mod common;

use bananas::config::Config;
use std::process::Command;
use std::time::Duration;

#[tokio::test]
async fn sigterm_ships_signal_record_then_stops_and_exits_zero() {
    let config = Config::new("abc")
        .with_interval(Duration::from_secs(3600))
        .with_signals(true);
    let (engine, sink, host) = common::start(config).await;
    assert_eq!(engine.signal_listeners(), 2);

    let status = Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .expect("kill runs");
    assert!(status.success());

    assert_eq!(host.wait_for_exit(Duration::from_secs(5)).await, Some(0));
    assert_eq!(host.stops(), 1);
    assert!(engine.is_shut_down());
    assert_eq!(engine.signal_listeners(), 0);
    assert_eq!(
        sink.tags(),
        common::tags(&[
            &["bananas", "initialized"],
            &["bananas", "signal", "SIGTERM"],
            &["bananas", "stopped"],
        ])
    );
}
