//! Error types
//!
//! One crate-wide [`Error`] with a variant per failure class. Transport
//! errors stay inside the connection task that hit them; nothing here is
//! allowed to reach the accept loop.

use std::io;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket closed, reset or otherwise broken
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed WebSocket handshake or frame
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Control command could not be decoded
    #[error("control command error: {0}")]
    Control(#[from] ControlError),

    /// Proxied upstream request failed
    #[error("upstream error: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Request method the proxy cannot forward
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Capture or image encoder failure
    #[error("capture error: {0}")]
    Capture(String),
}

impl Error {
    /// Whether this error only means the peer went away.
    ///
    /// These are expected during shutdown and client churn and are logged at
    /// debug level rather than treated as faults.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}

/// WebSocket protocol violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Upgrade request without a `Sec-WebSocket-Key` header
    #[error("missing Sec-WebSocket-Key header")]
    MissingWebSocketKey,

    /// Frame advertised a length code the decoder does not accept
    #[error("payload too large: length code {0} not supported")]
    PayloadTooLarge(u8),
}

/// Control command decode failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// Empty command string
    #[error("empty command")]
    Empty,

    /// Field 0 is not an integer
    #[error("invalid command type: {0:?}")]
    InvalidType(String),

    /// Field 0 is an integer outside the known command set
    #[error("unknown command type: {0}")]
    UnknownType(i32),

    /// Wrong number of `|`-separated fields
    #[error("{kind}: expected {expected} fields, got {actual}")]
    Arity {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A field failed to parse into its wire type
    #[error("{kind}: invalid {field} {value:?}")]
    InvalidField {
        kind: &'static str,
        field: &'static str,
        value: String,
    },
}
