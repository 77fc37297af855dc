//! Logging infrastructure for Koinonia
//!
//! Structured tracing setup shared by embedding binaries and integration tests.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with an env-filter fallback at the given level.
///
/// `RUST_LOG` takes precedence when set; otherwise the crate logs at
/// `log_level` and everything else at `info`.
pub fn init(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("koinonia={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
