//! TCP connection lifecycle for the batsd client.
//!
//! A [`Connection`] owns at most one socket to a fixed `host:port`. It is
//! opened eagerly by the client, dropped when a command exhausts its
//! attempts, and reopened lazily by the executor before the next send.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{ConnectionError, Failure};

/// Upper bound on a single TCP connect, independent of the command timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Observable state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket is open.
    Disconnected,
    /// A socket is open and assumed usable.
    Connected,
}

/// The live socket, split so reads can be buffered by line.
#[derive(Debug)]
struct Transport {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// A single logical connection to a batsd server.
#[derive(Debug)]
pub struct Connection {
    host: String,
    port: u16,
    connect_timeout: Duration,
    transport: Option<Transport>,
}

impl Connection {
    /// Creates a disconnected `Connection` for `host:port`.
    ///
    /// No I/O happens until [`connect`](Self::connect) is called.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: CONNECT_TIMEOUT,
            transport: None,
        }
    }

    /// Returns the `host:port` this connection dials.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        if self.transport.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Returns `true` if a socket is currently open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Opens a new socket, replacing any existing one.
    ///
    /// # Errors
    ///
    /// * [`ConnectionError::Timeout`] if the connect exceeds [`CONNECT_TIMEOUT`].
    /// * [`ConnectionError::CannotConnect`] for refused, unreachable or
    ///   unresolvable addresses.
    pub async fn connect(&mut self) -> Result<(), ConnectionError> {
        let addr = self.addr();
        tracing::debug!("Connecting to batsd at {}", addr);

        let stream = match timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                self.transport = None;
                return Err(ConnectionError::CannotConnect { addr, source });
            }
            Err(_) => {
                self.transport = None;
                return Err(ConnectionError::Timeout {
                    addr,
                    after: self.connect_timeout,
                });
            }
        };

        // Commands are single short lines; don't let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Could not set TCP_NODELAY on {}: {}", addr, e);
        }

        let (reader, writer) = stream.into_split();
        self.transport = Some(Transport {
            reader: BufReader::new(reader),
            writer,
        });

        tracing::debug!("Connected to batsd at {}", addr);
        Ok(())
    }

    /// Closes the socket if one is open. Never fails.
    pub fn disconnect(&mut self) {
        if self.transport.take().is_some() {
            tracing::debug!("Disconnected from batsd at {}", self.addr());
        }
    }

    /// Drops the current socket and opens a fresh one.
    pub async fn reconnect(&mut self) -> Result<(), ConnectionError> {
        self.disconnect();
        self.connect().await
    }

    /// Writes `line` followed by a newline and flushes it.
    pub async fn write_line(&mut self, line: &str) -> Result<(), Failure> {
        let transport = self.transport_mut()?;
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        transport.writer.write_all(&buf).await?;
        transport.writer.flush().await?;
        Ok(())
    }

    /// Reads one newline-terminated line, including the terminator.
    ///
    /// Returns [`Failure::Closed`] if the server closed the socket before a
    /// line arrived.
    pub async fn read_line(&mut self) -> Result<String, Failure> {
        let transport = self.transport_mut()?;
        let mut line = String::new();
        let bytes_read = transport.reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Err(Failure::Closed);
        }
        Ok(line)
    }

    /// Sends `line` and reads back the single response line.
    pub async fn round_trip(&mut self, line: &str) -> Result<String, Failure> {
        self.write_line(line).await?;
        self.read_line().await
    }

    fn transport_mut(&mut self) -> Result<&mut Transport, Failure> {
        self.transport.as_mut().ok_or_else(|| {
            Failure::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "no open connection to batsd",
            ))
        })
    }

    #[cfg(test)]
    pub(crate) fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}
