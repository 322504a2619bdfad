//! Error types for bridge operations.

use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur in the bridge layer.
///
/// Load and engine errors never escape to the UI: the loader degrades to the stub
/// table and the call surface swallows per-call failures. Only local input
/// validation (colors, numeric fields) surfaces errors to callers.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The engine factory is not present in the global registry.
    #[error("Engine factory not found: {0}")]
    FactoryMissing(String),

    /// The loading script could not be injected or failed to load.
    #[error("Failed to load engine script: {0}")]
    Script(String),

    /// A host primitive (frame clock, timer, DOM) failed.
    #[error("Host error: {0}")]
    Host(String),

    /// The factory raised an error while instantiating the engine.
    #[error("Engine instantiation failed: {0}")]
    Instantiate(String),

    /// The runtime-ready signal did not fire within the allowed wait.
    #[error("Engine runtime not ready after {0} ms")]
    ReadyTimeout(u32),

    /// An exported engine operation failed.
    #[error("Engine call `{op}` failed: {message}")]
    Engine {
        /// Operation name as exported by the engine.
        op: &'static str,
        /// Failure description reported by the engine.
        message: String,
    },

    /// A color string could not be parsed.
    #[error("Invalid color string: {0}")]
    InvalidColor(String),

    /// A numeric input field could not be parsed.
    #[error("Invalid numeric input: {0}")]
    InvalidNumber(String),

    /// Options serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Build an engine call failure for the given operation.
    #[must_use]
    pub fn engine(op: &'static str, message: impl Into<String>) -> Self {
        Self::Engine {
            op,
            message: message.into(),
        }
    }
}
