//! DAP transport and session error types.

use thiserror::Error;

/// Errors from DAP session operations.
#[derive(Debug, Error)]
pub enum DapError {
    /// Adapter process failed to start.
    #[error("adapter failed to start: {0}")]
    SpawnFailed(String),

    /// Transport-level communication error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Request timed out waiting for a response.
    #[error("request timed out: {command}")]
    Timeout {
        /// The command that timed out.
        command: String,
    },

    /// Adapter rejected the request.
    #[error("adapter rejected '{command}': {message}")]
    Rejected {
        /// The command that was rejected.
        command: String,
        /// The rejection message from the adapter.
        message: String,
    },

    /// Adapter sent an invalid or unparseable response.
    #[error("adapter sent invalid response: {0}")]
    InvalidResponse(String),

    /// The session is closed; no further requests can be sent.
    #[error("session closed")]
    Closed,
}
