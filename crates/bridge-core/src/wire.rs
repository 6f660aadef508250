//! Wire markers for the socket text protocol
//!
//! Every request and every response ends with [`TERMINATOR`]. A response is
//! either a literal value, the bare [`SUCCESS_MARKER`], or [`ERROR_MARKER`]
//! concatenated with a message.

/// Marker terminating every message in both directions
pub const TERMINATOR: &str = "<|END|>";

/// Default response for commands with no return value
pub const SUCCESS_MARKER: &str = "<|SUCCESS|>";

/// Prefix for error responses
pub const ERROR_MARKER: &str = "<|ERROR|>";

/// Build an error response body (no terminator)
pub fn error_response(message: &str) -> String {
    format!("{ERROR_MARKER}{message}")
}
