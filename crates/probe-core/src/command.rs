//! The contract between the command dispatcher and the engine.
//!
//! Concrete commands live in the binary; the engine only needs the trait so
//! it can invoke the `on_stopped` hooks when the debuggee halts.

use async_trait::async_trait;

use crate::debugger::Debugger;
use crate::error::DebuggerError;

/// One user-facing command.
#[async_trait]
pub trait Command: Send + Sync {
    /// Primary name the dispatcher routes on.
    fn name(&self) -> &'static str;

    /// Alternative names (e.g. `b` for `break`).
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// One-line usage string for `help`.
    fn usage(&self) -> &'static str;

    /// Execute the command against the engine.
    async fn run(&self, debugger: &mut Debugger, args: &[&str]) -> Result<(), DebuggerError>;

    /// Invoked after every stop event, once the engine has transitioned to
    /// stopped and reopened input. Failures must be handled internally.
    async fn on_stopped(&self, _debugger: &mut Debugger) {}
}
