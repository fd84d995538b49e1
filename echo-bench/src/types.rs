//! Error definitions for the benchmark harness.

use echo_client::RpcError;
use thiserror::Error;

/// Result type for benchmark operations
pub type BenchResult<T> = Result<T, BenchError>;

/// Error types for benchmark operations
#[derive(Error, Debug)]
pub enum BenchError {
    /// Logging or signal-handler setup failed
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// The requested flag combination cannot be run
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The RPC layer reported a failure that aborts the run
    #[error("Transport error: {0}")]
    Transport(#[from] RpcError),

    /// Filesystem error while exporting results
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("General error: {0}")]
    General(#[from] anyhow::Error),
}
