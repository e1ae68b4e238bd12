//! Subscriber setup for the command-line binary.

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber writing to stderr. `RUST_LOG` wins over
/// `default_filter`. Calling it again is a no-op.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
