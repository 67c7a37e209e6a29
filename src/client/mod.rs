//! Query client for a batsd server.
//!
//! [`Client`] is the public entry point. It connects eagerly on construction
//! and exposes the server's three commands as typed queries:
//!
//! - [`Client::ping`] returns the server's bare reply.
//! - [`Client::available`] lists metric keys, expanding timers into their
//!   derived statistics.
//! - [`Client::stats`] (and the [`values`](Client::values) /
//!   [`timestamps`](Client::timestamps) projections) fetch a metric's
//!   datapoints over a time range.
//!
//! Transport-level retries happen inside the [`Executor`]. Range queries
//! add a second, query-level retry when the server's answer does not
//! contain the requested metric.

pub mod command;
pub mod connection;
pub mod decode;
pub mod executor;

pub use command::Command;
pub use connection::{Connection, ConnectionState, CONNECT_TIMEOUT};
pub use decode::{JsonDecoder, Record, Response, ResponseDecoder, Scalar};
pub use executor::Executor;

use chrono::{DateTime, Utc};

use crate::error::{CommandError, Error, Result};
use crate::metrics;
use crate::{ClientConfig, MetricSample};

/// A connected batsd client.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    executor: Executor,
}

impl Client {
    /// Connects to the server described by `config`.
    ///
    /// # Errors
    ///
    /// Fails with a connection error if the initial connect fails; there is
    /// no retry at construction.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        Self::with_decoder(config, JsonDecoder).await
    }

    /// Connects using a custom response decoder.
    pub async fn with_decoder<D>(config: ClientConfig, decoder: D) -> Result<Self>
    where
        D: ResponseDecoder + 'static,
    {
        let mut executor = Executor::new(&config, Box::new(decoder));
        executor.connection_mut().connect().await?;
        tracing::info!("Connected to batsd at {}", config.addr());
        Ok(Self { config, executor })
    }

    /// Returns the configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns `true` if the client currently holds an open socket.
    pub fn is_connected(&self) -> bool {
        self.executor.connection().is_connected()
    }

    /// Closes the socket. The next query reconnects.
    pub fn disconnect(&mut self) {
        self.executor.connection_mut().disconnect();
    }

    /// Closes the socket and opens a fresh one.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.executor.connection_mut().reconnect().await?;
        Ok(())
    }

    /// Sends `ping` and returns the server's reply without its newline.
    pub async fn ping(&mut self) -> Result<String> {
        let command = Command::Ping;
        match self.executor.execute(&command).await? {
            Response::Text(reply) => Ok(reply),
            _ => Err(unexpected(&command)),
        }
    }

    /// Lists the metric keys the server holds.
    ///
    /// Timer keys are replaced by their six derived statistics
    /// (`<key>:mean`, `<key>:min`, ... `<key>:count`).
    pub async fn available(&mut self) -> Result<Vec<String>> {
        let command = Command::Available;
        match self.executor.execute(&command).await? {
            Response::Keys(keys) => Ok(metrics::expand_timer_keys(keys)),
            _ => Err(unexpected(&command)),
        }
    }

    /// Fetches the datapoints of `metric` between `start` and `end`.
    ///
    /// `end` defaults to now. If the server's response does not contain
    /// `metric`, the query is re-issued up to `max_attempts` more times
    /// before failing with [`Error::InvalidValues`].
    pub async fn stats(
        &mut self,
        metric: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<MetricSample>> {
        let command = Command::values(metric, start, end.unwrap_or_else(Utc::now))?;
        let max_attempts = self.config.max_attempts;
        let mut attempt: u32 = 0;

        loop {
            let mut series = match self.executor.execute(&command).await? {
                Response::Series(series) => series,
                _ => return Err(unexpected(&command)),
            };

            if let Some(records) = series.remove(metric) {
                return metrics::samples_from_records(metric, &records);
            }

            if attempt >= max_attempts {
                return Err(Error::InvalidValues {
                    metric: metric.to_string(),
                    attempts: attempt + 1,
                });
            }

            attempt += 1;
            tracing::warn!(
                "Command '{}' attempt {} of {} did not include '{}'; retrying",
                command,
                attempt,
                max_attempts + 1,
                metric
            );
        }
    }

    /// Like [`stats`](Self::stats), keeping only the values.
    pub async fn values(
        &mut self,
        metric: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<f64>> {
        let samples = self.stats(metric, start, end).await?;
        Ok(samples.into_iter().map(|s| s.value).collect())
    }

    /// Like [`stats`](Self::stats), keeping only the timestamps.
    pub async fn timestamps(
        &mut self,
        metric: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<DateTime<Utc>>> {
        let samples = self.stats(metric, start, end).await?;
        Ok(samples.into_iter().map(|s| s.timestamp).collect())
    }
}

fn unexpected(command: &Command) -> Error {
    CommandError::UnexpectedResponse {
        command: command.to_string(),
    }
    .into()
}
