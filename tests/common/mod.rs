#![allow(dead_code, unused_imports)]

//! Shared helpers for the integration tests.
//!
//! Tracing goes through `with_test_writer()`, so logs only show up for
//! failing tests. Enable levels with e.g. `RUST_LOG=debug cargo test`.

use std::sync::Arc;

use dagtest::engine::{Observer, RunOptions, RunReport};
use dagtest::TestGraph;

pub use dagtest_test_utils::builders;
pub use dagtest_test_utils::recorder::{Counter, RecordingObserver};
pub use dagtest_test_utils::{init_tracing, with_timeout, within};

/// Run `graph` with default options, recording every transition.
pub async fn run_recorded(graph: &TestGraph) -> (RunReport, RecordingObserver) {
    run_recorded_with(graph, RunOptions::default()).await
}

pub async fn run_recorded_with(
    graph: &TestGraph,
    options: RunOptions,
) -> (RunReport, RecordingObserver) {
    let recorder = RecordingObserver::new();
    let observer: Arc<dyn Observer> = Arc::new(recorder.clone());
    let report = with_timeout(dagtest::run(graph, options, observer)).await;
    (report, recorder)
}
