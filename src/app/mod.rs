//! REPL wiring: command registry, input loop, and preset mapping.

pub mod commands;
pub mod console;

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;

use probe_config::{Preset, PresetAction};
use probe_core::{Command, DebuggerHandle};
use probe_dap::{AdapterDescriptor, AdapterKind, LaunchAction};

/// Build the adapter descriptor for a named preset.
pub fn descriptor_from_preset(name: &str, preset: &Preset) -> AdapterDescriptor {
    AdapterDescriptor {
        name: name.to_string(),
        kind: AdapterKind::from_name(&preset.adapter),
        command: preset.command.clone(),
        args: preset.args.clone(),
        action: match preset.action {
            PresetAction::Launch => LaunchAction::Launch,
            PresetAction::Attach => LaunchAction::Attach,
        },
        launch_arguments: preset.launch_arguments_json(),
        attach_arguments: preset.attach_arguments_json(),
        async_stop_thread: preset.async_stop_thread,
        supports_code_blocks: preset.supports_code_blocks,
        wait_for_ready_signal: preset.wait_for_ready_signal,
        mute_output_categories: preset.mute_output.clone(),
        exception_filters: preset.exception_filters.clone(),
    }
}

/// The interactive prompt loop.
///
/// Reading is gated by the engine through the console's watch channel:
/// while the program runs, the loop parks on the gate instead of the
/// prompt.
pub struct Repl {
    handle: DebuggerHandle,
    commands: Vec<Arc<dyn Command>>,
    gate: watch::Receiver<bool>,
}

impl Repl {
    /// Create a REPL over an engine handle and its command set.
    pub fn new(
        handle: DebuggerHandle,
        commands: Vec<Arc<dyn Command>>,
        gate: watch::Receiver<bool>,
    ) -> Self {
        Self {
            handle,
            commands,
            gate,
        }
    }

    fn find(&self, token: &str) -> Option<Arc<dyn Command>> {
        self.commands
            .iter()
            .find(|c| c.name() == token || c.aliases().contains(&token))
            .cloned()
    }

    fn print_help(&self) {
        println!("Commands:");
        for command in &self.commands {
            println!("  {}", command.usage());
        }
        println!("  help  -- this list");
        println!("  quit  -- disconnect and exit");
        println!("Anything else is evaluated as an expression.");
    }

    /// Run until stdin closes or the user quits.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            // Park until the engine opens the input gate.
            while !*self.gate.borrow() {
                if self.gate.changed().await.is_err() {
                    return Ok(());
                }
            }

            print!("(probe) ");
            let _ = std::io::stdout().flush();

            let Some(line) = lines.next_line().await? else {
                // stdin closed
                self.handle.close().await;
                return Ok(());
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let mut parts = trimmed.split_whitespace();
            let first = parts.next().unwrap_or_default();
            let args: Vec<&str> = parts.collect();

            match first {
                "quit" | "exit" | "q" => {
                    self.handle.close().await;
                    return Ok(());
                }
                "help" | "h" => self.print_help(),
                _ => match self.find(first) {
                    Some(command) => {
                        let mut dbg = self.handle.lock().await;
                        if let Err(e) = command.run(&mut dbg, &args).await {
                            drop(dbg);
                            println!("error: {e}");
                        }
                    }
                    None => self.evaluate_input(trimmed, &mut lines).await?,
                },
            }
        }
    }

    /// Fallback: unrecognized input is an expression. A trailing backslash
    /// opens a code block (when the adapter supports them), continued
    /// until a line without one.
    async fn evaluate_input(
        &self,
        first_line: &str,
        lines: &mut Lines<BufReader<Stdin>>,
    ) -> anyhow::Result<()> {
        let supports_blocks = self.handle.lock().await.supports_code_blocks();

        let mut is_block = false;
        let mut text = first_line.to_string();
        while supports_blocks && text.ends_with('\\') {
            is_block = true;
            text.pop();
            text.push('\n');
            print!("... ");
            let _ = std::io::stdout().flush();
            match lines.next_line().await? {
                Some(next) => text.push_str(next.trim_end()),
                None => break,
            }
        }

        let mut dbg = self.handle.lock().await;
        match dbg.evaluate_expression(&text, is_block).await {
            Ok(result) => {
                drop(dbg);
                println!("{}", result.result);
            }
            Err(e) => {
                drop(dbg);
                println!("error: {e}");
            }
        }
        Ok(())
    }
}
