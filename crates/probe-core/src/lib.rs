//! probe-core — the debugger engine.
//!
//! This crate owns the user-visible debugging state and the session state
//! machine: threads, breakpoints, the source cache, and the event handling
//! that keeps them coherent with the adapter. The REPL surface lives in
//! the binary; the DAP transport lives in `probe-dap`.

pub mod breakpoint;
pub mod command;
pub mod console;
pub mod debugger;
pub mod error;
pub mod events;
pub mod source_cache;
pub mod thread;

// Re-export key types for convenience.
pub use breakpoint::{Breakpoint, BreakpointCollection, BreakpointKind, BreakpointState};
pub use command::Command;
pub use console::ConsoleIo;
pub use debugger::{
    AddedBreakpoint, Debugger, ScopeVariables, SessionFactory, SessionFuture, SessionState,
    PENDING_BREAKPOINT_MESSAGE,
};
pub use error::DebuggerError;
pub use events::{DebuggerHandle, FollowUp};
pub use source_cache::SourceFileCache;
pub use thread::{Thread, ThreadCollection};
