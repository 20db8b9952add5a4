pub mod builders;
pub mod timeline;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Route `arisa`'s tracing output into the test harness.
///
/// Output is captured and only shown for failing tests. The filter comes
/// from `RUST_LOG` (e.g. `RUST_LOG=arisa::task=trace` to follow
/// invalidations), defaulting to `info`. Safe to call from every test.
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

/// Fail the test if `f` has not finished within 5 seconds.
///
/// Guards waits on locks, channels and task phases. With a paused clock the
/// 5 seconds are virtual, so the timeout only fires once nothing else can
/// make progress.
pub async fn with_timeout<F: Future>(f: F) -> F::Output {
    match tokio::time::timeout(Duration::from_secs(5), f).await {
        Ok(out) => out,
        Err(_) => panic!("timed out after 5s waiting on a lock, channel or task"),
    }
}

/// Yield repeatedly so spawned tasks (dispatches, lock waiters) reach their
/// next await point before the test inspects state.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
