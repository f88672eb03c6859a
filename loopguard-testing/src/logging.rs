//! Tracing setup for test binaries.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_TEST_FILTER: &str = "loopguard=debug,loopguard_testing=debug";

/// Install a fmt subscriber writing through the test harness's capture.
///
/// Safe to call from every test; only the first call installs anything, and
/// an already-installed global subscriber is left in place.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_thread_names(true)
            .try_init();
    });
}
