//! Error types for the MySQL thin client.

use std::io;
use std::panic::Location;
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for MySQL thin client operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during network communication.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The server closed the connection mid-exchange.
    #[error("Connection closed")]
    ConnectionClosed,

    /// An operation was attempted without an established connection.
    #[error("No active connection")]
    NoConnection,

    /// The initial handshake packet could not be parsed.
    #[error("Malformed handshake: {message}")]
    MalformedHandshake { message: String },

    /// Authentication was rejected by the server.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Protocol error.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// A packet arrived with an unexpected sequence number.
    #[error("Packet out of order: expected sequence {expected}, got {actual}")]
    PacketOutOfOrder { expected: u8, actual: u8 },

    /// A response had the wrong shape for the command that produced it.
    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },

    /// Error reported by the server (ERR packet).
    ///
    /// `marker` and `state` are empty when the 4.1 protocol was not
    /// negotiated and the server omitted the SQL-state fields.
    #[error("[MySQL error {code}] {marker}{state}: {message}")]
    Server {
        code: u16,
        marker: String,
        state: String,
        message: String,
    },

    /// Bound parameter count does not match the prepared statement.
    #[error("Parameter count mismatch: statement expects {expected}, got {actual}")]
    ParameterCountMismatch { expected: usize, actual: usize },

    /// Column not found by name.
    #[error("Column not found: {name}")]
    ColumnNotFound { name: String },

    /// Column index out of bounds.
    #[error("Column index {index} out of bounds (columns: {count})")]
    ColumnIndexOutOfBounds { index: usize, count: usize },

    /// Buffer too small.
    #[error("Buffer too small: need {needed} bytes, have {available} at {location}")]
    BufferTooSmall {
        needed: usize,
        available: usize,
        location: &'static Location<'static>,
    },
}

impl Error {
    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create an unexpected-response error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            message: message.into(),
        }
    }
}
