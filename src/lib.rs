//! Client library for the batsd time-series metrics server.
//!
//! batsd speaks a newline-delimited text protocol over TCP: the client sends
//! `ping`, `available`, or `values <metric> <start> <end>` and reads back a
//! single line, either a bare string (`ping`) or JSON.
//!
//! ```no_run
//! use batsd_client::{Client, ClientConfig};
//! use chrono::{Duration, Utc};
//!
//! # async fn example() -> batsd_client::Result<()> {
//! let mut client = Client::connect(ClientConfig::default()).await?;
//! assert_eq!(client.ping().await?, "PONG");
//!
//! let start = Utc::now() - Duration::hours(1);
//! for sample in client.stats("gauges:cpu", start, None).await? {
//!     println!("{} {}", sample.timestamp, sample.value);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! A client holds exactly one connection and runs one command at a time;
//! every query method takes `&mut self`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client, command executor, and connection lifecycle.
pub mod client;

/// Configuration file loading and XDG path resolution.
pub mod config;

/// Error taxonomy for connection, command, and query failures.
pub mod error;

/// Logging initialization for the `batsd` binary.
pub mod logging;

/// Shaping of decoded responses into keys and samples.
pub mod metrics;

pub use client::command::Command;
pub use client::decode::{JsonDecoder, Response, ResponseDecoder};
pub use client::Client;
pub use error::{CommandError, ConnectionError, Error, Failure, Result};

/// Default batsd host.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default batsd port.
pub const DEFAULT_PORT: u16 = 8127;
/// Default per-command timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;
/// Default retry budget for connects and commands.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Connection settings for a [`Client`].
///
/// Any field left out of a TOML `[server]` table takes its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Hostname or IP address of the batsd server.
    pub host: String,
    /// TCP port of the batsd server.
    pub port: u16,
    /// Deadline in milliseconds for one command's write and read.
    pub timeout_ms: u64,
    /// Number of retries after the first try, for both commands and range
    /// queries.
    pub max_attempts: u32,
}

impl ClientConfig {
    /// Creates a config for `host:port` with default timeout and retry budget.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Returns a copy with `host` replaced.
    pub fn with_host(self, host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..self
        }
    }

    /// Returns a copy with `port` replaced.
    pub fn with_port(self, port: u16) -> Self {
        Self { port, ..self }
    }

    /// Returns a copy with `timeout_ms` replaced.
    pub fn with_timeout_ms(self, timeout_ms: u64) -> Self {
        Self { timeout_ms, ..self }
    }

    /// Returns a copy with `max_attempts` replaced.
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..self
        }
    }

    /// The per-command deadline as a [`Duration`].
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `host:port`, for display.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// One timestamped datapoint of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSample {
    /// When the datapoint was recorded (whole seconds).
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    /// The recorded value.
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8127);
        assert_eq!(config.timeout_ms, 2000);
        assert_eq!(config.max_attempts, 2);
    }

    #[test]
    fn test_client_config_new_keeps_other_defaults() {
        let config = ClientConfig::new("stats.internal", 9000);
        assert_eq!(config.host, "stats.internal");
        assert_eq!(config.port, 9000);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn test_each_override_replaces_only_its_field() {
        let base = ClientConfig::default();

        let c = base.clone().with_host("10.0.0.5");
        assert_eq!(c, ClientConfig { host: "10.0.0.5".to_string(), ..base.clone() });

        let c = base.clone().with_port(1);
        assert_eq!(c, ClientConfig { port: 1, ..base.clone() });

        let c = base.clone().with_timeout_ms(1);
        assert_eq!(c, ClientConfig { timeout_ms: 1, ..base.clone() });

        let c = base.clone().with_max_attempts(0);
        assert_eq!(c, ClientConfig { max_attempts: 0, ..base });
    }

    #[test]
    fn test_command_timeout_is_millis() {
        let config = ClientConfig::default().with_timeout_ms(250);
        assert_eq!(config.command_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_addr() {
        assert_eq!(ClientConfig::default().addr(), "127.0.0.1:8127");
    }

    #[test]
    fn test_partial_toml_table_fills_defaults() {
        let config: ClientConfig = toml::from_str("port = 9999\n").expect("should parse");
        assert_eq!(config.port, 9999);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn test_empty_toml_table_is_default() {
        let config: ClientConfig = toml::from_str("").expect("should parse");
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_metric_sample_serializes_epoch_seconds() {
        let sample = MetricSample {
            timestamp: Utc.timestamp_opt(1000, 0).single().expect("valid timestamp"),
            value: 1.5,
        };
        let value = serde_json::to_value(sample).expect("Failed to serialize");
        assert_eq!(value["timestamp"].as_i64(), Some(1000));
        assert_eq!(value["value"].as_f64(), Some(1.5));
    }
}
