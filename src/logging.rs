use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a global fmt subscriber. `RUST_LOG` takes precedence over `default_filter`.
///
/// Returns `false` when a global subscriber is already set (by an earlier call or the host
/// application); the existing one stays in place.
pub fn init_logging(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}
