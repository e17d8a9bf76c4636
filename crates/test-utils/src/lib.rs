//! Shared fixtures for the `testdrive` integration tests.

pub mod builders;
pub mod jobs;
pub mod readers;

use std::sync::Once;
use std::time::Duration;

use testdrive::logging::{LOG_ENV, filter_spec};
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// How long any single awaited step in a test may take.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a test subscriber with the same filter the service uses.
///
/// Output goes through the test writer, so it only shows for failing tests
/// (or with `-- --nocapture`). Set `TESTDRIVE_LOG=debug` or a directive
/// string such as `TESTDRIVE_LOG=testdrive::publish=trace` to see more.
pub fn init_tracing() {
    INIT.call_once(|| {
        let env_value = std::env::var(LOG_ENV).ok();
        let filter = EnvFilter::new(filter_spec(None, env_value.as_deref()));

        // Another harness may already own the global subscriber.
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Await `f`, panicking if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .expect("Test timed out after 5 seconds")
}
