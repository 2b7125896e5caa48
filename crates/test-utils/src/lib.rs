pub mod builders;
pub mod fake_executor;
pub mod scripts;
pub mod sinks;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Route the crate's `tracing` diagnostics (process spawns, terminations,
/// log-service sink failures) into the test harness output.
///
/// Safe to call from every test; only the first call installs the
/// subscriber. Defaults to `info`, override with `RUST_LOG`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, failing the test if it takes longer than 10 seconds.
///
/// Real task scripts and cancellation paths go through here so a hung
/// process fails the test instead of stalling the suite.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(10), f)
        .await
        .expect("task did not settle within 10 seconds")
}
