//! Replay harness errors.

use std::path::PathBuf;

use thiserror::Error;
use vectormate_core::BridgeError;

/// Result type for replay operations.
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Errors that can occur while loading or running a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// A script or options file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A script or options document is malformed.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A bridge call rejected its input.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}
