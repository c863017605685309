//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Initialize tracing for the process. Events go to stderr so that command
/// output on stdout stays machine-readable.
///
/// `RUST_LOG` overrides `default_filter`. Safe to call multiple times
/// (subsequent calls are no-ops).
pub fn init(default_filter: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
