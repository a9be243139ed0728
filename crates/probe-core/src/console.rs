//! Console abstraction.
//!
//! The engine never prints directly; it emits output and gates REPL input
//! through this trait. The binary implements it over stdout and a watch
//! channel; tests use a recording fake.

/// The terminal surface the engine talks to.
pub trait ConsoleIo: Send + Sync {
    /// Write text as-is (no trailing newline added).
    fn output(&self, text: &str);

    /// Write a full line.
    fn output_line(&self, text: &str);

    /// Allow the REPL to read and dispatch user input.
    fn start_input(&self);

    /// Suspend REPL input (the program is running).
    fn stop_input(&self);

    /// The session is over; release the terminal.
    fn close(&self);
}
