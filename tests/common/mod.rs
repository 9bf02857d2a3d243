//! Shared test utilities.

#![allow(dead_code)]

use lode::Snapshot;
use serde_json::Value;

/// Install a test subscriber so `RUST_LOG` controls engine tracing in
/// test output. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn snap(value: Value) -> Snapshot {
    Snapshot::from_value(value).expect("test state must be an object")
}
