//! Commands understood by the batsd server.
//!
//! Each command renders to exactly one line on the wire:
//! `ping`, `available`, or `values <metric> <start_epoch> <end_epoch>`.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::CommandError;

/// A single request sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Liveness check; the server answers with a bare string.
    Ping,
    /// List the metric keys the server holds.
    Available,
    /// Fetch datapoints for one metric within `[start, end]`.
    Values {
        /// Metric key, e.g. `gauges:cpu` or `timers:latency:mean`.
        metric: String,
        /// Start of the range.
        start: DateTime<Utc>,
        /// End of the range.
        end: DateTime<Utc>,
    },
}

impl Command {
    /// Builds a range query, rejecting metric names that cannot be sent on
    /// a single space-delimited line.
    pub fn values(
        metric: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, CommandError> {
        let reason = if metric.is_empty() {
            Some("metric name is empty")
        } else if metric.chars().any(|c| c.is_whitespace() || c.is_control()) {
            Some("metric name contains whitespace or control characters")
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(CommandError::Invalid {
                command: format!("values {}", metric.escape_debug()),
                reason: reason.to_string(),
            });
        }

        Ok(Command::Values {
            metric: metric.to_string(),
            start,
            end,
        })
    }

    /// Returns `true` for the one command whose response is not JSON.
    pub fn is_ping(&self) -> bool {
        matches!(self, Command::Ping)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Ping => write!(f, "ping"),
            Command::Available => write!(f, "available"),
            Command::Values { metric, start, end } => {
                write!(f, "values {} {} {}", metric, start.timestamp(), end.timestamp())
            }
        }
    }
}
