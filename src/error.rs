//! Error types for node-debug-client.

use thiserror::Error;

/// Main error type for all debugger operations.
#[derive(Debug, Error)]
pub enum DebuggerError {
    /// I/O error on the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket handshake or transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Protocol error (oversized frame, malformed header block, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The endpoint URI uses a scheme no transport understands.
    #[error("Unsupported URI scheme: {0}")]
    UnsupportedScheme(String),

    /// The endpoint URI could not be used to reach a debuggee.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A required argument was missing or out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A request with this sequence id is already awaiting its response.
    #[error("Request id {0} is already pending")]
    DuplicateRequestId(i64),

    /// The debuggee answered the command with `success: false`.
    #[error("{message}")]
    CommandFailed {
        /// Protocol verb of the failed command.
        command: String,
        /// Error message reported by the debuggee.
        message: String,
    },

    /// Connection closed while the operation was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// Connect or request timed out.
    #[error("Timed out")]
    Timeout,
}

impl DebuggerError {
    /// Build a [`DebuggerError::InvalidArgument`].
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Result type alias using DebuggerError.
pub type Result<T> = std::result::Result<T, DebuggerError>;
