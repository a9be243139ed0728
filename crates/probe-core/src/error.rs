//! Engine error taxonomy.

use probe_dap::DapError;
use thiserror::Error;

/// Errors surfaced to user commands by the debugger engine.
#[derive(Debug, Error)]
pub enum DebuggerError {
    /// No adapter session is attached.
    #[error("no active debug session")]
    NoActiveSession,

    /// The operation requires a launched program, but the session is still
    /// initializing or configuring.
    #[error("the program is not running yet")]
    NotRunning,

    /// The operation requires a launched program, but one is already running.
    #[error("the program is already running")]
    AlreadyRunning,

    /// The operation requires a stopped thread.
    #[error("the program is not stopped")]
    NotStopped,

    /// A breakpoint, thread, or frame lookup failed.
    #[error("{what} not found")]
    NotFound {
        /// What was looked up, e.g. "breakpoint 3" or "thread 7".
        what: String,
    },

    /// The adapter did not advertise a capability this operation needs.
    #[error("the adapter does not support {0}")]
    UnsupportedCapability(&'static str),

    /// A DAP request failed.
    #[error("adapter request failed: {0}")]
    Adapter(DapError),

    /// An in-flight operation was aborted by session teardown.
    #[error("operation aborted")]
    Aborted,

    /// An engine invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DebuggerError {
    /// Convenience constructor for [`DebuggerError::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        DebuggerError::NotFound { what: what.into() }
    }
}

impl From<DapError> for DebuggerError {
    fn from(err: DapError) -> Self {
        match err {
            // The session went away under an in-flight request.
            DapError::Closed => DebuggerError::Aborted,
            other => DebuggerError::Adapter(other),
        }
    }
}
