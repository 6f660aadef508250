//! Error types for the bridge

use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Bridge error types
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Malformed message (bad grammar, unbalanced brackets, bad numbers)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Failure while executing a well-formed command
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Control queue is at capacity
    #[error("Control queue full: {0}")]
    QueueFull(String),

    /// `bridge.control` text matched no known shape
    #[error("Unknown control command: {0}")]
    UnknownControl(String),

    /// Transport-level I/O error
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Dispatch(err.to_string())
    }
}
