//! Error types for the batsd client.
//!
//! Errors form a small tree: [`Error`] is the base type every public
//! operation returns, with [`ConnectionError`] and [`CommandError`] as the
//! two families beneath it. Callers can match broadly on `Error` or narrowly
//! on a single family variant.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::client::decode::DecodeError;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Base error for every batsd client operation.
#[derive(Error, Debug)]
pub enum Error {
    /// Establishing the TCP connection failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Sending a command or reading its response failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The server never returned the requested metric in a values response.
    #[error("server returned no values for '{metric}' after {attempts} attempts")]
    InvalidValues {
        /// Metric name that was queried.
        metric: String,
        /// Number of range queries issued before giving up.
        attempts: u32,
    },

    /// A values record could not be interpreted as a sample.
    #[error("malformed sample for '{metric}': {field} = {raw}")]
    MalformedSample {
        /// Metric name the record belongs to.
        metric: String,
        /// Record field that failed to convert (`timestamp` or `value`).
        field: &'static str,
        /// The raw field as received.
        raw: String,
    },
}

impl Error {
    /// Returns `true` for errors of the connection family.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Returns `true` for errors of the command family.
    pub fn is_command(&self) -> bool {
        matches!(self, Error::Command(_))
    }
}

/// Errors raised while opening the TCP connection.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The connection was refused, unreachable, or the host did not resolve.
    #[error("cannot connect to batsd at {addr}")]
    CannotConnect {
        /// `host:port` that was dialed.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The connect did not complete within the fixed connect timeout.
    #[error("connection to batsd at {addr} timed out after {after:?}")]
    Timeout {
        /// `host:port` that was dialed.
        addr: String,
        /// The connect deadline that elapsed.
        after: Duration,
    },
}

/// Errors raised while executing a command on an open connection.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Every attempt exceeded the per-command timeout.
    #[error("command '{command}' timed out after {attempts} attempts ({after:?} each)")]
    Timeout {
        /// Wire line of the command.
        command: String,
        /// Number of attempts made.
        attempts: u32,
        /// Per-attempt deadline.
        after: Duration,
    },

    /// Every attempt failed with a transport or decode failure.
    ///
    /// The connection is invalidated when this is returned.
    #[error("command '{command}' failed after {attempts} attempts")]
    Failed {
        /// Wire line of the command.
        command: String,
        /// Number of attempts made.
        attempts: u32,
        /// The failure seen on the last attempt.
        #[source]
        source: Failure,
    },

    /// The command could not be built; nothing was sent.
    #[error("invalid command '{command}': {reason}")]
    Invalid {
        /// The offending command text.
        command: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The decoder produced a response of the wrong kind for the command.
    #[error("unexpected response kind for command '{command}'")]
    UnexpectedResponse {
        /// Wire line of the command.
        command: String,
    },
}

/// A retryable failure of a single send/receive attempt.
#[derive(Error, Debug)]
pub enum Failure {
    /// Socket write, flush or read failed.
    #[error("socket error")]
    Io(#[from] io::Error),

    /// The server closed the connection before sending a response line.
    #[error("connection closed by server")]
    Closed,

    /// The response line did not decode for this command.
    #[error("undecodable response")]
    Decode(#[from] DecodeError),
}
