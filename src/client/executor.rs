//! Command execution with bounded, immediate retries.
//!
//! One call to [`Executor::execute`] makes up to `max_attempts + 1` tries.
//! Each try lazily connects if needed, then writes the command and reads one
//! response line inside a single `timeout` window.
//!
//! Timeouts leave the socket in place: a slow server is not a dead one.
//! Transport and decode failures are retried on the same socket, and only
//! when the budget runs out is the connection dropped, so the next call
//! starts from a fresh connect.

use std::time::Duration;

use tokio::time::timeout;

use crate::client::command::Command;
use crate::client::connection::Connection;
use crate::client::decode::{Response, ResponseDecoder};
use crate::error::{CommandError, ConnectionError, Error, Failure, Result};
use crate::ClientConfig;

/// Why a single attempt did not produce a response.
#[derive(Debug)]
enum AttemptError {
    /// Lazy connect before the send failed.
    Connect(ConnectionError),
    /// The write+read window elapsed.
    Timeout,
    /// Socket or decode failure.
    Failed(Failure),
}

/// Sends commands over a [`Connection`] and decodes the responses.
pub struct Executor {
    connection: Connection,
    decoder: Box<dyn ResponseDecoder>,
    command_timeout: Duration,
    max_attempts: u32,
}

impl Executor {
    /// Creates an executor for `config`. The connection starts disconnected.
    pub fn new(config: &ClientConfig, decoder: Box<dyn ResponseDecoder>) -> Self {
        Self {
            connection: Connection::new(config.host.clone(), config.port),
            decoder,
            command_timeout: config.command_timeout(),
            max_attempts: config.max_attempts,
        }
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns the underlying connection mutably, for explicit lifecycle calls.
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }

    /// Executes `command`, retrying on timeout or transport/decode failure.
    ///
    /// # Errors
    ///
    /// * [`CommandError::Timeout`] if every attempt timed out. The connection
    ///   stays open.
    /// * [`CommandError::Failed`] if every attempt failed otherwise. The
    ///   connection is dropped.
    /// * [`Error::Connection`] if every attempt failed to (re)connect.
    pub async fn execute(&mut self, command: &Command) -> Result<Response> {
        let line = command.to_string();
        let mut attempt: u32 = 0;

        loop {
            let err = match self.attempt(command, &line).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if attempt >= self.max_attempts {
                return Err(self.exhausted(line, attempt + 1, err));
            }

            attempt += 1;
            tracing::warn!(
                "Command '{}' attempt {} of {} failed: {}; retrying",
                line,
                attempt,
                self.max_attempts + 1,
                describe(&err)
            );
        }
    }

    async fn attempt(
        &mut self,
        command: &Command,
        line: &str,
    ) -> std::result::Result<Response, AttemptError> {
        if !self.connection.is_connected() {
            self.connection
                .connect()
                .await
                .map_err(AttemptError::Connect)?;
        }

        tracing::debug!("Sending '{}' to {}", line, self.connection.addr());
        let raw = match timeout(self.command_timeout, self.connection.round_trip(line)).await {
            Ok(result) => result.map_err(AttemptError::Failed)?,
            Err(_) => return Err(AttemptError::Timeout),
        };

        self.decoder
            .decode(command, &raw)
            .map_err(|e| AttemptError::Failed(e.into()))
    }

    fn exhausted(&mut self, command: String, attempts: u32, err: AttemptError) -> Error {
        match err {
            AttemptError::Connect(e) => e.into(),
            AttemptError::Timeout => CommandError::Timeout {
                command,
                attempts,
                after: self.command_timeout,
            }
            .into(),
            AttemptError::Failed(source) => {
                self.connection.disconnect();
                CommandError::Failed {
                    command,
                    attempts,
                    source,
                }
                .into()
            }
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("connection", &self.connection)
            .field("command_timeout", &self.command_timeout)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

fn describe(err: &AttemptError) -> String {
    match err {
        AttemptError::Connect(e) => e.to_string(),
        AttemptError::Timeout => "timed out".to_string(),
        AttemptError::Failed(Failure::Io(e)) => format!("socket error: {}", e),
        AttemptError::Failed(f) => f.to_string(),
    }
}
