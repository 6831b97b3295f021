//! Logging setup for stow hosts.
//!
//! Connection and engine events are emitted through `tracing`; this module
//! installs a subscriber for native binaries and tests. Browser hosts bring
//! their own subscriber.

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with stow defaults.
///
/// Sets up tracing-subscriber with:
/// - Environment filter (RUST_LOG), falling back to `info`
/// - Compact format suitable for terminal output
///
/// Panics if a global subscriber is already installed.
pub fn init() {
    init_with_filter("info");
}

/// Initialize tracing with a custom default filter, e.g. `"stow_core=debug"`.
pub fn init_with_filter(default_filter: &str) {
    subscriber(default_filter).init();
}

/// Like [`init_with_filter`], but returns an error instead of panicking when
/// a global subscriber is already installed.
pub fn try_init_with_filter(default_filter: &str) -> Result<(), TryInitError> {
    subscriber(default_filter).try_init()
}

fn subscriber(default_filter: &str) -> impl SubscriberInitExt {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
}
