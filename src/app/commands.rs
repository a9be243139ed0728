//! The built-in REPL commands.
//!
//! Each command is a thin translation from parsed arguments to one or two
//! engine operations; all state lives in the engine. Parse problems print
//! usage and return cleanly — only engine failures propagate.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use probe_core::{BreakpointKind, BreakpointState, Command, Debugger, DebuggerError};

/// Every built-in command, in help order.
pub fn all_commands() -> Vec<Arc<dyn Command>> {
    vec![
        Arc::new(BreakCommand),
        Arc::new(DeleteCommand),
        Arc::new(EnableCommand),
        Arc::new(DisableCommand),
        Arc::new(ToggleCommand),
        Arc::new(InfoCommand),
        Arc::new(RunCommand),
        Arc::new(ContinueCommand),
        Arc::new(NextCommand),
        Arc::new(StepCommand),
        Arc::new(FinishCommand),
        Arc::new(InterruptCommand),
        Arc::new(BacktraceCommand),
        Arc::new(FrameCommand),
        Arc::new(ThreadCommand),
        Arc::new(ListCommand),
        Arc::new(LocalsCommand),
        Arc::new(PrintCommand),
        Arc::new(DisplayCommand::default()),
    ]
}

/// Parse `FILE:LINE` into a source location. Anything else is a function
/// name.
fn parse_location(target: &str) -> Option<(&str, i64)> {
    let (path, line) = target.rsplit_once(':')?;
    if path.is_empty() {
        return None;
    }
    line.parse::<i64>().ok().map(|line| (path, line))
}

fn parse_index(arg: &str) -> Option<u32> {
    arg.parse::<u32>().ok()
}

fn state_name(state: BreakpointState) -> &'static str {
    match state {
        BreakpointState::Enabled => "enabled",
        BreakpointState::Disabled => "disabled",
        BreakpointState::Once => "once",
    }
}

// ---------------------------------------------------------------------------
// Breakpoints
// ---------------------------------------------------------------------------

pub struct BreakCommand;

#[async_trait]
impl Command for BreakCommand {
    fn name(&self) -> &'static str {
        "break"
    }
    fn aliases(&self) -> &'static [&'static str] {
        &["b"]
    }
    fn usage(&self) -> &'static str {
        "break [--once] FILE:LINE | FUNCTION  -- set a breakpoint"
    }

    async fn run(&self, dbg: &mut Debugger, args: &[&str]) -> Result<(), DebuggerError> {
        let mut once = false;
        let mut target = None;
        for arg in args {
            match *arg {
                "--once" => once = true,
                other => target = Some(other),
            }
        }
        let Some(target) = target else {
            dbg.console().output_line(self.usage());
            return Ok(());
        };

        let added = match parse_location(target) {
            Some((path, line)) => dbg.set_source_breakpoint(path, line, once).await?,
            None => dbg.set_function_breakpoint(target, once).await?,
        };
        let console = dbg.console();
        match &added.message {
            Some(message) => console.output_line(&format!("Breakpoint {}: {message}", added.index)),
            None => console.output_line(&format!("Breakpoint {} set.", added.index)),
        }
        Ok(())
    }
}

pub struct DeleteCommand;

#[async_trait]
impl Command for DeleteCommand {
    fn name(&self) -> &'static str {
        "delete"
    }
    fn aliases(&self) -> &'static [&'static str] {
        &["d"]
    }
    fn usage(&self) -> &'static str {
        "delete [NUM|all]  -- delete one or all breakpoints"
    }

    async fn run(&self, dbg: &mut Debugger, args: &[&str]) -> Result<(), DebuggerError> {
        match args.first() {
            None | Some(&"all") => {
                dbg.delete_all_breakpoints().await?;
                dbg.console().output_line("All breakpoints deleted.");
            }
            Some(arg) => match parse_index(arg) {
                Some(index) => {
                    dbg.delete_breakpoint(index).await?;
                    dbg.console()
                        .output_line(&format!("Breakpoint {index} deleted."));
                }
                None => dbg.console().output_line(self.usage()),
            },
        }
        Ok(())
    }
}

pub struct EnableCommand;

#[async_trait]
impl Command for EnableCommand {
    fn name(&self) -> &'static str {
        "enable"
    }
    fn usage(&self) -> &'static str {
        "enable [NUM|all]  -- enable one or all breakpoints"
    }

    async fn run(&self, dbg: &mut Debugger, args: &[&str]) -> Result<(), DebuggerError> {
        set_enabled(dbg, args, true, self.usage()).await
    }
}

pub struct DisableCommand;

#[async_trait]
impl Command for DisableCommand {
    fn name(&self) -> &'static str {
        "disable"
    }
    fn usage(&self) -> &'static str {
        "disable [NUM|all]  -- disable one or all breakpoints"
    }

    async fn run(&self, dbg: &mut Debugger, args: &[&str]) -> Result<(), DebuggerError> {
        set_enabled(dbg, args, false, self.usage()).await
    }
}

async fn set_enabled(
    dbg: &mut Debugger,
    args: &[&str],
    enabled: bool,
    usage: &str,
) -> Result<(), DebuggerError> {
    let verb = if enabled { "enabled" } else { "disabled" };
    match args.first() {
        None | Some(&"all") => {
            dbg.set_all_breakpoints_enabled(enabled).await?;
            dbg.console()
                .output_line(&format!("All breakpoints {verb}."));
        }
        Some(arg) => match parse_index(arg) {
            Some(index) => {
                dbg.set_breakpoint_enabled(index, enabled).await?;
                dbg.console()
                    .output_line(&format!("Breakpoint {index} {verb}."));
            }
            None => dbg.console().output_line(usage),
        },
    }
    Ok(())
}

pub struct ToggleCommand;

#[async_trait]
impl Command for ToggleCommand {
    fn name(&self) -> &'static str {
        "toggle"
    }
    fn usage(&self) -> &'static str {
        "toggle NUM|all  -- flip breakpoints between enabled and disabled"
    }

    async fn run(&self, dbg: &mut Debugger, args: &[&str]) -> Result<(), DebuggerError> {
        match args.first() {
            Some(&"all") => {
                dbg.toggle_all_breakpoints().await?;
                dbg.console().output_line("All breakpoints toggled.");
            }
            Some(arg) => match parse_index(arg) {
                Some(index) => {
                    let state = dbg.toggle_breakpoint(index).await?;
                    dbg.console()
                        .output_line(&format!("Breakpoint {index} is now {}.", state_name(state)));
                }
                None => dbg.console().output_line(self.usage()),
            },
            None => dbg.console().output_line(self.usage()),
        }
        Ok(())
    }
}

pub struct InfoCommand;

#[async_trait]
impl Command for InfoCommand {
    fn name(&self) -> &'static str {
        "info"
    }
    fn aliases(&self) -> &'static [&'static str] {
        &["i"]
    }
    fn usage(&self) -> &'static str {
        "info breakpoints|threads|adapter  -- show debugger state"
    }

    async fn run(&self, dbg: &mut Debugger, args: &[&str]) -> Result<(), DebuggerError> {
        match args.first().copied() {
            Some("breakpoints") | Some("b") => info_breakpoints(dbg),
            Some("threads") => info_threads(dbg),
            Some("adapter") => info_adapter(dbg).await,
            _ => dbg.console().output_line(self.usage()),
        }
        Ok(())
    }
}

fn info_breakpoints(dbg: &Debugger) {
    let console = dbg.console();
    let breakpoints = dbg.get_all_breakpoints();
    if breakpoints.is_empty() {
        console.output_line("No breakpoints.");
        return;
    }
    console.output_line("Num  State     Verified  Where");
    for bp in breakpoints {
        let location = match bp.kind() {
            BreakpointKind::Source { path, line } => format!("{path}:{line}"),
            BreakpointKind::Function { name, path, line } => match (path, line) {
                (Some(path), Some(line)) => format!("{name} ({path}:{line})"),
                _ => name.clone(),
            },
        };
        let verified = if bp.is_verified() { "yes" } else { "no" };
        let mut row = format!(
            "{:<4} {:<9} {:<9} {location}",
            bp.index(),
            state_name(bp.state()),
            verified
        );
        if let Some(message) = bp.message() {
            row.push_str(&format!("  ({message})"));
        }
        console.output_line(&row);
    }
}

fn info_threads(dbg: &Debugger) {
    let console = dbg.console();
    if dbg.threads().is_empty() {
        console.output_line("No threads.");
        return;
    }
    let focus = dbg.threads().focus_thread_id();
    for thread in dbg.threads().all_threads() {
        let marker = if focus == Some(thread.id()) { "*" } else { " " };
        let state = if thread.is_stopped() {
            "stopped"
        } else {
            "running"
        };
        console.output_line(&format!(
            "{marker} {:<4} {:<8} {}",
            thread.id(),
            state,
            thread.name()
        ));
    }
}

async fn info_adapter(dbg: &mut Debugger) {
    let console = dbg.console();
    let caps = dbg.adapter_caps();
    console.output_line(&format!("adapter: {}", dbg.adapter().name));
    console.output_line(&format!(
        "  configurationDone: {}",
        caps.supports_configuration_done_request
    ));
    console.output_line(&format!(
        "  function breakpoints: {}",
        caps.supports_function_breakpoints
    ));
    console.output_line(&format!(
        "  conditional breakpoints: {}",
        caps.supports_conditional_breakpoints
    ));
    console.output_line(&format!(
        "  breakpoint id on stop: {}",
        caps.supports_breakpoint_id_on_stop
    ));
    console.output_line(&format!(
        "  exception filters: {}",
        if caps.exception_filters.is_empty() {
            "none".to_string()
        } else {
            caps.exception_filters.join(", ")
        }
    ));
    // Adapter-specific report, when the adapter implements it.
    if let Ok(info) = dbg.adapter_info().await {
        if !info.is_null() {
            console.output_line(&info.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Flow control
// ---------------------------------------------------------------------------

pub struct RunCommand;

#[async_trait]
impl Command for RunCommand {
    fn name(&self) -> &'static str {
        "run"
    }
    fn aliases(&self) -> &'static [&'static str] {
        &["r"]
    }
    fn usage(&self) -> &'static str {
        "run  -- finish configuration and let the program run"
    }

    async fn run(&self, dbg: &mut Debugger, _args: &[&str]) -> Result<(), DebuggerError> {
        dbg.run().await
    }
}

pub struct ContinueCommand;

#[async_trait]
impl Command for ContinueCommand {
    fn name(&self) -> &'static str {
        "continue"
    }
    fn aliases(&self) -> &'static [&'static str] {
        &["c"]
    }
    fn usage(&self) -> &'static str {
        "continue  -- resume the program"
    }

    async fn run(&self, dbg: &mut Debugger, _args: &[&str]) -> Result<(), DebuggerError> {
        dbg.continue_execution().await
    }
}

pub struct NextCommand;

#[async_trait]
impl Command for NextCommand {
    fn name(&self) -> &'static str {
        "next"
    }
    fn aliases(&self) -> &'static [&'static str] {
        &["n"]
    }
    fn usage(&self) -> &'static str {
        "next  -- step over"
    }

    async fn run(&self, dbg: &mut Debugger, _args: &[&str]) -> Result<(), DebuggerError> {
        dbg.step_over().await
    }
}

pub struct StepCommand;

#[async_trait]
impl Command for StepCommand {
    fn name(&self) -> &'static str {
        "step"
    }
    fn aliases(&self) -> &'static [&'static str] {
        &["s"]
    }
    fn usage(&self) -> &'static str {
        "step  -- step into"
    }

    async fn run(&self, dbg: &mut Debugger, _args: &[&str]) -> Result<(), DebuggerError> {
        dbg.step_in().await
    }
}

pub struct FinishCommand;

#[async_trait]
impl Command for FinishCommand {
    fn name(&self) -> &'static str {
        "finish"
    }
    fn usage(&self) -> &'static str {
        "finish  -- step out of the current function"
    }

    async fn run(&self, dbg: &mut Debugger, _args: &[&str]) -> Result<(), DebuggerError> {
        dbg.step_out().await
    }
}

pub struct InterruptCommand;

#[async_trait]
impl Command for InterruptCommand {
    fn name(&self) -> &'static str {
        "interrupt"
    }
    fn usage(&self) -> &'static str {
        "interrupt  -- break into the running program"
    }

    async fn run(&self, dbg: &mut Debugger, _args: &[&str]) -> Result<(), DebuggerError> {
        dbg.break_in().await
    }
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

pub struct BacktraceCommand;

#[async_trait]
impl Command for BacktraceCommand {
    fn name(&self) -> &'static str {
        "backtrace"
    }
    fn aliases(&self) -> &'static [&'static str] {
        &["bt", "where"]
    }
    fn usage(&self) -> &'static str {
        "backtrace  -- print the focus thread's stack"
    }

    async fn run(&self, dbg: &mut Debugger, _args: &[&str]) -> Result<(), DebuggerError> {
        let thread_id = dbg
            .threads()
            .focus_thread_id()
            .ok_or(DebuggerError::NotStopped)?;
        let selected = dbg
            .threads()
            .focus_thread()
            .map(|t| t.selected_stack_frame())
            .unwrap_or(0);
        let trace = dbg.get_stack_trace(thread_id, None).await?;
        let console = dbg.console();
        for (i, frame) in trace.stack_frames.iter().enumerate() {
            let marker = if i == selected { "*" } else { " " };
            let location = frame
                .source
                .as_ref()
                .and_then(|s| s.path.as_deref().or(s.name.as_deref()))
                .map(|path| format!(" at {path}:{}", frame.line))
                .unwrap_or_default();
            console.output_line(&format!("{marker}#{i}  {}{location}", frame.name));
        }
        Ok(())
    }
}

pub struct FrameCommand;

#[async_trait]
impl Command for FrameCommand {
    fn name(&self) -> &'static str {
        "frame"
    }
    fn aliases(&self) -> &'static [&'static str] {
        &["f"]
    }
    fn usage(&self) -> &'static str {
        "frame [NUM]  -- select or show the current stack frame"
    }

    async fn run(&self, dbg: &mut Debugger, args: &[&str]) -> Result<(), DebuggerError> {
        if let Some(arg) = args.first() {
            let Ok(index) = arg.parse::<usize>() else {
                dbg.console().output_line(self.usage());
                return Ok(());
            };
            let thread_id = dbg
                .threads()
                .focus_thread_id()
                .ok_or(DebuggerError::NotStopped)?;
            dbg.set_selected_stack_frame(thread_id, index).await?;
        }
        let frame = dbg.get_current_stack_frame().await?;
        let location = frame
            .source
            .as_ref()
            .and_then(|s| s.path.as_deref().or(s.name.as_deref()))
            .map(|path| format!(" at {path}:{}", frame.line))
            .unwrap_or_default();
        dbg.console()
            .output_line(&format!("{}{location}", frame.name));
        Ok(())
    }
}

pub struct ThreadCommand;

#[async_trait]
impl Command for ThreadCommand {
    fn name(&self) -> &'static str {
        "thread"
    }
    fn aliases(&self) -> &'static [&'static str] {
        &["t"]
    }
    fn usage(&self) -> &'static str {
        "thread [ID]  -- select or show the focus thread"
    }

    async fn run(&self, dbg: &mut Debugger, args: &[&str]) -> Result<(), DebuggerError> {
        if let Some(arg) = args.first() {
            let Ok(id) = arg.parse::<i64>() else {
                dbg.console().output_line(self.usage());
                return Ok(());
            };
            dbg.set_focus_thread(id)?;
        }
        match dbg.threads().focus_thread() {
            Some(thread) => dbg.console().output_line(&format!(
                "Focus thread is {} ({}).",
                thread.id(),
                thread.name()
            )),
            None => dbg.console().output_line("No focus thread."),
        }
        Ok(())
    }
}

pub struct ListCommand;

#[async_trait]
impl Command for ListCommand {
    fn name(&self) -> &'static str {
        "list"
    }
    fn aliases(&self) -> &'static [&'static str] {
        &["l"]
    }
    fn usage(&self) -> &'static str {
        "list  -- show source around the current line"
    }

    async fn run(&self, dbg: &mut Debugger, _args: &[&str]) -> Result<(), DebuggerError> {
        let frame = dbg.get_current_stack_frame().await?;
        let Some(source) = frame.source.clone() else {
            dbg.console().output_line("No source for the current frame.");
            return Ok(());
        };
        let lines = dbg.get_source_lines(&source).await;
        let current = frame.line.max(1);
        let first = (current - 5).max(1);
        let last = (current + 5).min(lines.len() as i64);
        let console = dbg.console();
        for number in first..=last {
            let marker = if number == current { "->" } else { "  " };
            let text = probe_core::source_cache::line_at(&lines, number).unwrap_or("");
            console.output_line(&format!("{number:>5} {marker} {text}"));
        }
        Ok(())
    }
}

pub struct LocalsCommand;

#[async_trait]
impl Command for LocalsCommand {
    fn name(&self) -> &'static str {
        "locals"
    }
    fn usage(&self) -> &'static str {
        "locals [SCOPE]  -- show variables of the selected frame"
    }

    async fn run(&self, dbg: &mut Debugger, args: &[&str]) -> Result<(), DebuggerError> {
        let scopes = dbg.get_variables_by_scope(args.first().copied()).await?;
        let console = dbg.console();
        for entry in scopes {
            console.output_line(&format!("{}:", entry.scope.name));
            match entry.variables {
                Some(variables) => {
                    for var in variables {
                        let type_suffix = var
                            .variable_type
                            .as_deref()
                            .map(|t| format!(" ({t})"))
                            .unwrap_or_default();
                        console.output_line(&format!("  {} = {}{type_suffix}", var.name, var.value));
                    }
                }
                None => console.output_line("  (expensive scope; not fetched)"),
            }
        }
        Ok(())
    }
}

pub struct PrintCommand;

#[async_trait]
impl Command for PrintCommand {
    fn name(&self) -> &'static str {
        "print"
    }
    fn aliases(&self) -> &'static [&'static str] {
        &["p"]
    }
    fn usage(&self) -> &'static str {
        "print EXPR  -- evaluate an expression"
    }

    async fn run(&self, dbg: &mut Debugger, args: &[&str]) -> Result<(), DebuggerError> {
        if args.is_empty() {
            dbg.console().output_line(self.usage());
            return Ok(());
        }
        let expression = args.join(" ");
        let result = dbg.evaluate_expression(&expression, false).await?;
        dbg.console().output_line(&result.result);
        Ok(())
    }
}

/// gdb-style auto-display: expressions re-evaluated and printed on every
/// stop, via the `on_stopped` hook.
#[derive(Default)]
pub struct DisplayCommand {
    expressions: Mutex<Vec<String>>,
}

#[async_trait]
impl Command for DisplayCommand {
    fn name(&self) -> &'static str {
        "display"
    }
    fn usage(&self) -> &'static str {
        "display [EXPR]  -- print EXPR on every stop (no arg: list, 'clear': reset)"
    }

    async fn run(&self, dbg: &mut Debugger, args: &[&str]) -> Result<(), DebuggerError> {
        let console = dbg.console();
        if args.is_empty() {
            let expressions = self.expressions.lock().unwrap().clone();
            if expressions.is_empty() {
                console.output_line("No display expressions.");
            }
            for (i, expr) in expressions.iter().enumerate() {
                console.output_line(&format!("{i}: {expr}"));
            }
            return Ok(());
        }
        if args == ["clear"] {
            self.expressions.lock().unwrap().clear();
            console.output_line("Display expressions cleared.");
            return Ok(());
        }
        let expression = args.join(" ");
        let result = dbg.evaluate_expression(&expression, false).await?;
        let slot = {
            let mut expressions = self.expressions.lock().unwrap();
            expressions.push(expression.clone());
            expressions.len() - 1
        };
        dbg.console()
            .output_line(&format!("{slot}: {expression} = {}", result.result));
        Ok(())
    }

    async fn on_stopped(&self, dbg: &mut Debugger) {
        let expressions = self.expressions.lock().unwrap().clone();
        for (i, expression) in expressions.iter().enumerate() {
            match dbg.evaluate_expression(expression, false).await {
                Ok(result) => dbg
                    .console()
                    .output_line(&format!("{i}: {expression} = {}", result.result)),
                Err(e) => dbg
                    .console()
                    .output_line(&format!("{i}: {expression} = <error: {e}>")),
            }
        }
    }
}
