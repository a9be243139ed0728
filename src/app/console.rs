//! Terminal console: stdout output plus the REPL input gate.

use std::io::Write;
use std::sync::Arc;

use tokio::sync::watch;

use probe_core::ConsoleIo;

/// Console over the process stdout. Input gating is a watch channel the
/// REPL loop observes: the engine flips it as the state machine moves
/// between running and stopped.
pub struct StdConsole {
    gate: watch::Sender<bool>,
}

impl StdConsole {
    /// Create the console and the gate receiver for the REPL loop.
    /// Input starts disabled; the engine enables it when ready.
    pub fn new() -> (Arc<Self>, watch::Receiver<bool>) {
        let (gate, gate_rx) = watch::channel(false);
        (Arc::new(Self { gate }), gate_rx)
    }
}

impl ConsoleIo for StdConsole {
    fn output(&self, text: &str) {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }

    fn output_line(&self, text: &str) {
        println!("{text}");
    }

    fn start_input(&self) {
        let _ = self.gate.send(true);
    }

    fn stop_input(&self) {
        let _ = self.gate.send(false);
    }

    fn close(&self) {
        let _ = self.gate.send(false);
    }
}
