use std::net::SocketAddr;

use thiserror::Error;

use echo_wire::WireError;

/// Main error type for echo client operations
#[derive(Error, Debug)]
pub enum RpcError {
    /// Connection establishment failures
    #[error("Connect error: {message}")]
    Connect {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Protocol violations observed on an established connection
    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        peer: Option<SocketAddr>,
    },

    /// Frame encode/decode errors
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    /// A call that did not complete within its deadline
    #[error("Call timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Calls issued on a channel whose reader has died
    #[error("Channel broken: {message}")]
    Broken { message: String },

    /// Operations the selected protocol or topology cannot perform
    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    /// Malformed connection parameters
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O errors (wrapper for `std::io::Error`)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    pub fn connect<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Connect {
            message: message.into(),
            source: Some(source.into()),
        }
    }
    pub fn protocol(message: impl Into<String>, peer: Option<SocketAddr>) -> Self {
        Self::Protocol {
            message: message.into(),
            peer,
        }
    }
    #[must_use]
    pub const fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }
    pub fn broken(message: impl Into<String>) -> Self {
        Self::Broken {
            message: message.into(),
        }
    }
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether re-issuing the call might succeed. Only deadline misses are
    /// retried; a broken channel or protocol violation never is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type alias for echo client operations
pub type Result<T, E = RpcError> = std::result::Result<T, E>;
