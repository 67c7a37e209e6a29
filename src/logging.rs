//! Logging initialization for the `batsd` binary.
//!
//! Configures the `tracing` subscriber with level filtering via the
//! `BATSD_LOG` environment variable. When it is unset or invalid, the
//! caller's default directive (normally the config file's `[log] level`)
//! is used.
//!
//! ```bash
//! BATSD_LOG=debug batsd stats gauges:cpu
//! BATSD_LOG=batsd_client=trace,warn batsd available
//! ```

use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "BATSD_LOG";

/// Builds the filter: `BATSD_LOG` if it parses, else `default_directive`,
/// else `warn`.
pub fn filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Initialize the tracing subscriber, writing to stderr so stdout stays
/// clean for query output.
///
/// A second call is a no-op.
pub fn init(default_directive: &str) {
    let _ = fmt()
        .with_env_filter(filter(default_directive))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
