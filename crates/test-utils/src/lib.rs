//! Helpers shared by the dagtest integration tests.
//!
//! - [`builders`] makes small graphs out of passing, failing and sleeping
//!   bodies.
//! - [`recorder`] observes transitions and counts body calls.

pub mod builders;
pub mod recorder;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

/// Deadline used by [`with_timeout`]; graph runs in tests finish well
/// within it.
pub const RUN_DEADLINE: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

/// Install the test subscriber once per test binary.
///
/// Output goes through `with_test_writer()`, so it only shows up for
/// failing tests. `RUST_LOG=dagtest=debug` raises the level.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, panicking if it takes longer than `limit`. A hung scheduler
/// fails the test instead of stalling the suite.
pub async fn within<F, T>(limit: Duration, f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(limit, f).await {
        Ok(value) => value,
        Err(_) => panic!("run did not finish within {limit:?}"),
    }
}

/// [`within`] the default [`RUN_DEADLINE`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    within(RUN_DEADLINE, f).await
}
