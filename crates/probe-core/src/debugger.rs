//! The debugger engine.
//!
//! [`Debugger`] owns the user-visible debugging state: the session state
//! machine, the thread and breakpoint collections, and the source cache.
//! User commands call its operations; adapter events are fed to it by the
//! event pump (see the `events` module). Both run under one lock, so at any
//! instant either a command handler or an event handler is executing, never
//! both; the only suspension points are awaits on outstanding DAP requests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;

use probe_dap::{
    AdapterCapabilities, AdapterDescriptor, AdapterEvent, DapError, EvaluateArguments,
    EvaluateResponseBody, FunctionBreakpoint, InitializeRequestArguments, LaunchAction, Scope,
    Session, Source, SourceBreakpoint, StackFrame, StackTraceArguments, StackTraceResponseBody,
    Variable,
};

use crate::breakpoint::{Breakpoint, BreakpointCollection, BreakpointKind, BreakpointState};
use crate::command::Command;
use crate::console::ConsoleIo;
use crate::error::DebuggerError;
use crate::source_cache::SourceFileCache;
use crate::thread::ThreadCollection;

/// Message attached to breakpoints created before the program starts.
pub const PENDING_BREAKPOINT_MESSAGE: &str = "Breakpoint pending until program starts.";

/// The engine-level session state. Every user-visible operation validates
/// against this variable; only engine methods and event handlers mutate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// `initialize` in flight; waiting for the `initialized` event.
    Initializing,
    /// Between the `initialized` event and `configurationDone`.
    Configuring,
    /// The program is executing.
    Running,
    /// The program is paused at a stop event.
    Stopped,
    /// The program is gone.
    Terminated,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Initializing => "initializing",
            SessionState::Configuring => "configuring",
            SessionState::Running => "running",
            SessionState::Stopped => "stopped",
            SessionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Result of creating a breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedBreakpoint {
    /// The user-facing handle of the new breakpoint.
    pub index: u32,
    /// Status message for display, from the adapter or the engine.
    pub message: Option<String>,
}

/// One scope of the selected frame, with its variables when queried.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeVariables {
    /// The scope as the adapter reported it.
    pub scope: Scope,
    /// The scope's variables; absent for expensive scopes that were listed
    /// but not queried.
    pub variables: Option<Vec<Variable>>,
}

/// Future returned by a [`SessionFactory`].
pub type SessionFuture = Pin<Box<dyn Future<Output = Result<Session, DapError>> + Send>>;

/// Creates a fresh adapter session for each launch or relaunch.
pub type SessionFactory = Box<dyn FnMut() -> SessionFuture + Send + Sync>;

/// The debugger engine. See the module docs for the concurrency model.
pub struct Debugger {
    adapter: AdapterDescriptor,
    console: Arc<dyn ConsoleIo>,
    factory: SessionFactory,
    session: Option<Session>,
    state: SessionState,
    /// Bumped on every relaunch; events from older sessions are stale.
    epoch: u64,
    threads: ThreadCollection,
    breakpoints: BreakpointCollection,
    source_cache: SourceFileCache,
    caps: AdapterCapabilities,
    commands: Vec<Arc<dyn Command>>,
    /// Set while tearing down a session we initiated ourselves, so the
    /// resulting adapter-exited event is recognized and ignored.
    pub(crate) disconnecting: bool,
    pub(crate) ready_for_evaluations: bool,
    pending_events: Option<(u64, mpsc::UnboundedReceiver<AdapterEvent>)>,
    shutdown: Option<mpsc::UnboundedSender<i32>>,
}

impl Debugger {
    /// Create an engine that spawns the adapter process described by
    /// `adapter` on every launch.
    pub fn new(adapter: AdapterDescriptor, console: Arc<dyn ConsoleIo>) -> Self {
        let command = adapter.command.clone();
        let args = adapter.args.clone();
        let factory: SessionFactory = Box::new(move || {
            let command = command.clone();
            let args = args.clone();
            Box::pin(async move { Session::spawn(&command, &args) })
        });
        Self::with_factory(adapter, console, factory)
    }

    /// Create an engine with a custom session factory. Tests use this to
    /// connect scripted adapters over in-memory pipes.
    pub fn with_factory(
        adapter: AdapterDescriptor,
        console: Arc<dyn ConsoleIo>,
        factory: SessionFactory,
    ) -> Self {
        Self {
            adapter,
            console,
            factory,
            session: None,
            state: SessionState::Terminated,
            epoch: 0,
            threads: ThreadCollection::new(),
            breakpoints: BreakpointCollection::new(),
            source_cache: SourceFileCache::new(),
            caps: AdapterCapabilities::default(),
            commands: Vec::new(),
            disconnecting: false,
            ready_for_evaluations: false,
            pending_events: None,
            shutdown: None,
        }
    }

    /// Register a command whose `on_stopped` hook runs after stop events.
    pub fn register_command(&mut self, command: Arc<dyn Command>) {
        self.commands.push(command);
    }

    pub(crate) fn registered_commands(&self) -> Vec<Arc<dyn Command>> {
        self.commands.clone()
    }

    pub(crate) fn set_shutdown_notifier(&mut self, tx: mpsc::UnboundedSender<i32>) {
        self.shutdown = Some(tx);
    }

    // -- accessors ---------------------------------------------------------

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The thread collection.
    pub fn threads(&self) -> &ThreadCollection {
        &self.threads
    }

    pub(crate) fn threads_mut(&mut self) -> &mut ThreadCollection {
        &mut self.threads
    }

    /// The breakpoint registry.
    pub fn breakpoints(&self) -> &BreakpointCollection {
        &self.breakpoints
    }

    /// The console collaborator.
    pub fn console(&self) -> Arc<dyn ConsoleIo> {
        self.console.clone()
    }

    /// The adapter descriptor this engine drives.
    pub fn adapter(&self) -> &AdapterDescriptor {
        &self.adapter
    }

    /// Capabilities of the current adapter. Meaningful once a session has
    /// completed `initialize`.
    pub fn adapter_caps(&self) -> &AdapterCapabilities {
        &self.caps
    }

    /// Whether multi-line code blocks may be evaluated.
    pub fn supports_code_blocks(&self) -> bool {
        self.adapter.supports_code_blocks
    }

    /// Whether stop events can be attributed to a breakpoint, which is what
    /// one-shot breakpoints require.
    pub fn supports_stopped_at_breakpoint(&self) -> bool {
        self.caps.supports_breakpoint_id_on_stop
    }

    fn session(&self) -> Result<&Session, DebuggerError> {
        self.session.as_ref().ok_or(DebuggerError::NoActiveSession)
    }

    pub(crate) fn session_ref(&self) -> Result<&Session, DebuggerError> {
        self.session()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub(crate) fn breakpoints_mut(&mut self) -> &mut BreakpointCollection {
        &mut self.breakpoints
    }

    pub(crate) fn drop_session(&mut self) {
        self.session = None;
        self.threads.clear();
        self.source_cache.flush();
    }

    /// Whether the debuggee has been started on the current session.
    fn program_started(&self) -> bool {
        self.session.is_some()
            && matches!(self.state, SessionState::Running | SessionState::Stopped)
    }

    // -- lifecycle ---------------------------------------------------------

    /// Start debugging: reset the breakpoint registry and open the first
    /// session.
    pub async fn launch(&mut self) -> Result<(), DebuggerError> {
        self.breakpoints = BreakpointCollection::new();
        self.relaunch().await
    }

    /// Tear down the current session (if any) and open a fresh one.
    ///
    /// Breakpoints survive; they are re-sent to the new adapter when the
    /// session reaches the running state.
    pub async fn relaunch(&mut self) -> Result<(), DebuggerError> {
        if let Some(old) = self.session.take() {
            self.disconnecting = true;
            if let Err(e) = old.disconnect().await {
                tracing::debug!("disconnect on relaunch failed: {e}");
            }
        }
        self.threads.clear();
        self.source_cache.flush();
        self.state = SessionState::Initializing;
        self.epoch += 1;
        self.ready_for_evaluations = !self.adapter.wait_for_ready_signal;

        let mut session = (self.factory)().await?;
        let caps = session
            .initialize(InitializeRequestArguments::for_adapter(&self.adapter.name))
            .await?
            .clone();
        if caps.supports_breakpoint_id_on_stop {
            self.breakpoints.enable_once_state();
        } else {
            self.breakpoints.disable_once_state();
        }
        self.caps = caps;

        let events = session.take_events().ok_or_else(|| {
            DebuggerError::Internal("session event stream already taken".into())
        })?;
        self.pending_events = Some((self.epoch, events));
        self.disconnecting = false;

        match self.adapter.action {
            LaunchAction::Attach => {
                let args = self
                    .adapter
                    .transform_attach_arguments(self.adapter.attach_arguments.clone());
                session.attach(args).await?;
            }
            LaunchAction::Launch => {
                // Adapters may defer the launch response until
                // configurationDone, so it cannot be awaited here. A failed
                // launch is fatal for the host (legacy exit status 0).
                let args = self
                    .adapter
                    .transform_launch_arguments(self.adapter.launch_arguments.clone());
                let requester = session.requester();
                let console = self.console.clone();
                let shutdown = self.shutdown.clone();
                tokio::spawn(async move {
                    if let Err(e) = requester
                        .request_with_timeout("launch", Some(args), None)
                        .await
                    {
                        tracing::error!("launch request failed: {e}");
                        console.output_line(&format!("Failed to launch the target: {e}"));
                        if let Some(shutdown) = shutdown {
                            let _ = shutdown.send(0);
                        }
                    }
                });
            }
        }

        self.session = Some(session);
        Ok(())
    }

    /// Take the event stream of the most recent session, tagged with its
    /// epoch. The caller is responsible for pumping it into
    /// [`Debugger::handle_event`].
    pub fn take_event_stream(
        &mut self,
    ) -> Option<(u64, mpsc::UnboundedReceiver<AdapterEvent>)> {
        self.pending_events.take()
    }

    /// Disconnect from the adapter and drop all per-run state.
    pub async fn close_session(&mut self) {
        self.disconnecting = true;
        if let Some(session) = self.session.take() {
            if let Err(e) = session.disconnect().await {
                tracing::debug!("disconnect on close failed: {e}");
            }
        }
        self.state = SessionState::Terminated;
        self.threads.clear();
        self.source_cache.flush();
    }

    // -- breakpoints -------------------------------------------------------

    /// Create a source breakpoint at `path:line`.
    ///
    /// When the program has started, the breakpoint is reconciled with the
    /// adapter immediately; otherwise the adapter call is deferred to the
    /// transition into running and the returned message says so.
    pub async fn set_source_breakpoint(
        &mut self,
        path: &str,
        line: i64,
        once: bool,
    ) -> Result<AddedBreakpoint, DebuggerError> {
        let index = self.breakpoints.add_source_breakpoint(path, line, once)?;
        if !self.program_started() {
            return Ok(AddedBreakpoint {
                index,
                message: Some(PENDING_BREAKPOINT_MESSAGE.into()),
            });
        }
        if let Err(e) = self.sync_source_path(path).await {
            let _ = self.breakpoints.delete_breakpoint(index);
            return Err(e);
        }
        let message = self
            .breakpoints
            .get_breakpoint_by_index(index)?
            .message()
            .map(str::to_string);
        Ok(AddedBreakpoint { index, message })
    }

    /// Create a function breakpoint. Requires adapter support.
    pub async fn set_function_breakpoint(
        &mut self,
        name: &str,
        once: bool,
    ) -> Result<AddedBreakpoint, DebuggerError> {
        if !self.caps.supports_function_breakpoints {
            return Err(DebuggerError::UnsupportedCapability("function breakpoints"));
        }
        let index = self.breakpoints.add_function_breakpoint(name, once)?;
        if !self.program_started() {
            return Ok(AddedBreakpoint {
                index,
                message: Some(PENDING_BREAKPOINT_MESSAGE.into()),
            });
        }
        if let Err(e) = self.sync_function_breakpoints().await {
            let _ = self.breakpoints.delete_breakpoint(index);
            return Err(e);
        }
        let message = self
            .breakpoints
            .get_breakpoint_by_index(index)?
            .message()
            .map(str::to_string);
        Ok(AddedBreakpoint { index, message })
    }

    /// Delete one breakpoint and push the shrunken batch to the adapter.
    pub async fn delete_breakpoint(&mut self, index: u32) -> Result<(), DebuggerError> {
        let removed = self.breakpoints.delete_breakpoint(index)?;
        if self.program_started() {
            match removed.kind() {
                BreakpointKind::Source { path, .. } => self.sync_source_path(path).await?,
                BreakpointKind::Function { .. } => self.sync_function_breakpoints().await?,
            }
        }
        Ok(())
    }

    /// Delete every breakpoint and clear the adapter's batches.
    pub async fn delete_all_breakpoints(&mut self) -> Result<(), DebuggerError> {
        let paths = self.breakpoints.get_all_breakpoint_paths();
        let had_functions = self.breakpoints.has_function_breakpoints();
        self.breakpoints.delete_all_breakpoints();
        if self.program_started() {
            for path in &paths {
                self.sync_source_path(path).await?;
            }
            if had_functions && self.caps.supports_function_breakpoints {
                self.sync_function_breakpoints().await?;
            }
        }
        Ok(())
    }

    /// All breakpoints, ascending by index.
    pub fn get_all_breakpoints(&self) -> Vec<&Breakpoint> {
        self.breakpoints.all().collect()
    }

    /// Look up one breakpoint by its user-facing index.
    pub fn get_breakpoint_by_index(&self, index: u32) -> Result<&Breakpoint, DebuggerError> {
        self.breakpoints.get_breakpoint_by_index(index)
    }

    /// Flip one breakpoint between enabled and disabled and reconcile.
    ///
    /// A failed adapter call rolls the state back and re-throws, so a
    /// toggle is all-or-nothing.
    pub async fn toggle_breakpoint(
        &mut self,
        index: u32,
    ) -> Result<BreakpointState, DebuggerError> {
        let prior = self.breakpoints.get_breakpoint_by_index(index)?.state();
        let new_state = self.breakpoints.toggle_state(index)?;
        if let Err(e) = self.resync_breakpoint(index).await {
            self.breakpoints.force_state(index, prior);
            return Err(e);
        }
        Ok(new_state)
    }

    /// Enable or disable one breakpoint and reconcile, with rollback.
    pub async fn set_breakpoint_enabled(
        &mut self,
        index: u32,
        enabled: bool,
    ) -> Result<(), DebuggerError> {
        let prior = self.breakpoints.get_breakpoint_by_index(index)?.state();
        let target = if enabled {
            BreakpointState::Enabled
        } else {
            BreakpointState::Disabled
        };
        if prior == target {
            return Ok(());
        }
        self.breakpoints.set_state(index, target)?;
        if let Err(e) = self.resync_breakpoint(index).await {
            self.breakpoints.force_state(index, prior);
            return Err(e);
        }
        Ok(())
    }

    /// Toggle every breakpoint, with rollback of the whole batch.
    pub async fn toggle_all_breakpoints(&mut self) -> Result<(), DebuggerError> {
        let snapshot: Vec<(u32, BreakpointState)> = self
            .breakpoints
            .all()
            .map(|bp| (bp.index(), bp.state()))
            .collect();
        for (index, _) in &snapshot {
            self.breakpoints.toggle_state(*index)?;
        }
        if self.program_started() {
            if let Err(e) = self.reset_all_breakpoints().await {
                for (index, state) in &snapshot {
                    self.breakpoints.force_state(*index, *state);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Enable or disable every breakpoint, with rollback of the whole batch.
    pub async fn set_all_breakpoints_enabled(
        &mut self,
        enabled: bool,
    ) -> Result<(), DebuggerError> {
        let snapshot: Vec<(u32, BreakpointState)> = self
            .breakpoints
            .all()
            .map(|bp| (bp.index(), bp.state()))
            .collect();
        let target = if enabled {
            BreakpointState::Enabled
        } else {
            BreakpointState::Disabled
        };
        for (index, _) in &snapshot {
            self.breakpoints.set_state(*index, target)?;
        }
        if self.program_started() {
            if let Err(e) = self.reset_all_breakpoints().await {
                for (index, state) in &snapshot {
                    self.breakpoints.force_state(*index, *state);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    async fn resync_breakpoint(&mut self, index: u32) -> Result<(), DebuggerError> {
        if !self.program_started() {
            return Ok(());
        }
        let kind = self.breakpoints.get_breakpoint_by_index(index)?.kind().clone();
        match kind {
            BreakpointKind::Source { path, .. } => self.sync_source_path(&path).await,
            BreakpointKind::Function { .. } => self.sync_function_breakpoints().await,
        }
    }

    /// Re-establish every breakpoint on the adapter. Invoked when the
    /// session reaches running (also after relaunch) and after a one-shot
    /// breakpoint disables itself.
    pub(crate) async fn reset_all_breakpoints(&mut self) -> Result<(), DebuggerError> {
        for path in self.breakpoints.get_all_breakpoint_paths() {
            self.sync_source_path(&path).await?;
        }
        if self.caps.supports_function_breakpoints {
            self.sync_function_breakpoints().await?;
        }
        Ok(())
    }

    /// Send the full enabled set for one source and pair the response
    /// positionally: the adapter replaces all breakpoints of that source,
    /// and DAP guarantees response order and length match the request.
    async fn sync_source_path(&mut self, path: &str) -> Result<(), DebuggerError> {
        let entries: Vec<(u32, i64)> = self
            .breakpoints
            .get_all_enabled_breakpoints_for_source(path)
            .iter()
            .filter_map(|bp| bp.location().map(|(_, line)| (bp.index(), line)))
            .collect();
        let wire: Vec<SourceBreakpoint> = entries
            .iter()
            .map(|(_, line)| SourceBreakpoint {
                line: *line,
                column: None,
                condition: None,
            })
            .collect();

        let infos = self
            .session()?
            .set_breakpoints(Source::from_path(path), wire)
            .await?;
        if infos.len() != entries.len() {
            return Err(DebuggerError::Internal(format!(
                "adapter returned {} breakpoints for {} requested at {path}",
                infos.len(),
                entries.len()
            )));
        }
        for ((index, _), info) in entries.iter().zip(infos) {
            self.breakpoints.set_breakpoint_id(*index, info.id)?;
            // Without an id, a later breakpoint-changed event can never be
            // correlated, so the breakpoint counts as verified now.
            let verified = if info.id.is_none() { true } else { info.verified };
            self.breakpoints.set_breakpoint_verified(*index, verified)?;
            self.breakpoints.set_breakpoint_message(*index, info.message)?;
        }
        Ok(())
    }

    /// Send the full enabled function-breakpoint set and pair positionally,
    /// recording any source location the adapter resolved.
    async fn sync_function_breakpoints(&mut self) -> Result<(), DebuggerError> {
        let entries: Vec<(u32, String)> = self
            .breakpoints
            .get_all_enabled_function_breakpoints()
            .iter()
            .filter_map(|bp| match bp.kind() {
                BreakpointKind::Function { name, .. } => Some((bp.index(), name.clone())),
                BreakpointKind::Source { .. } => None,
            })
            .collect();
        let wire: Vec<FunctionBreakpoint> = entries
            .iter()
            .map(|(_, name)| FunctionBreakpoint {
                name: name.clone(),
                condition: None,
            })
            .collect();

        let infos = self.session()?.set_function_breakpoints(wire).await?;
        if infos.len() != entries.len() {
            return Err(DebuggerError::Internal(format!(
                "adapter returned {} function breakpoints for {} requested",
                infos.len(),
                entries.len()
            )));
        }
        for ((index, _), info) in entries.iter().zip(infos) {
            self.breakpoints.set_breakpoint_id(*index, info.id)?;
            let verified = if info.id.is_none() { true } else { info.verified };
            self.breakpoints.set_breakpoint_verified(*index, verified)?;
            self.breakpoints
                .set_breakpoint_message(*index, info.message.clone())?;
            if let (Some(source), Some(line)) = (info.source, info.line) {
                if let Some(path) = source.path {
                    self.breakpoints.set_path_and_line(*index, path, line)?;
                }
            }
        }
        Ok(())
    }

    // -- flow control ------------------------------------------------------

    /// Leave configuration: push breakpoints and exception filters to the
    /// adapter, signal `configurationDone`, and let the program run.
    pub async fn run(&mut self) -> Result<(), DebuggerError> {
        match self.state {
            SessionState::Configuring => {}
            SessionState::Initializing => return Err(DebuggerError::NotRunning),
            SessionState::Running | SessionState::Stopped => {
                return Err(DebuggerError::AlreadyRunning)
            }
            SessionState::Terminated => {
                return Err(if self.session.is_none() {
                    DebuggerError::NoActiveSession
                } else {
                    DebuggerError::NotRunning
                })
            }
        }
        // The batches are deferred while configuring; flush them now.
        self.state = SessionState::Running;
        if let Err(e) = self.flush_configuration().await {
            self.state = SessionState::Configuring;
            return Err(e);
        }
        self.console.stop_input();
        Ok(())
    }

    async fn flush_configuration(&mut self) -> Result<(), DebuggerError> {
        self.reset_all_breakpoints().await?;
        let filters = self.exception_filters();
        self.session()?.set_exception_breakpoints(filters).await?;
        if self.caps.supports_configuration_done_request {
            self.session()?.configuration_done().await?;
        }
        Ok(())
    }

    fn exception_filters(&self) -> Vec<String> {
        match &self.adapter.exception_filters {
            Some(filters) => filters.clone(),
            None => self
                .session
                .as_ref()
                .map(|s| AdapterCapabilities::default_exception_filters(s.raw_capabilities()))
                .unwrap_or_default(),
        }
    }

    fn require_stopped_focus(&self) -> Result<i64, DebuggerError> {
        if self.session.is_none() {
            return Err(DebuggerError::NoActiveSession);
        }
        if self.state != SessionState::Stopped {
            return Err(DebuggerError::NotStopped);
        }
        self.threads
            .focus_thread_id()
            .or_else(|| self.threads.first_stopped_thread().map(|t| t.id()))
            .ok_or(DebuggerError::NotStopped)
    }

    /// Resume the whole program.
    pub async fn continue_execution(&mut self) -> Result<(), DebuggerError> {
        self.resume(ResumeMode::Continue).await
    }

    /// Step over on the focus thread.
    pub async fn step_over(&mut self) -> Result<(), DebuggerError> {
        self.resume(ResumeMode::StepOver).await
    }

    /// Step into on the focus thread.
    pub async fn step_in(&mut self) -> Result<(), DebuggerError> {
        self.resume(ResumeMode::StepIn).await
    }

    /// Step out on the focus thread.
    pub async fn step_out(&mut self) -> Result<(), DebuggerError> {
        self.resume(ResumeMode::StepOut).await
    }

    async fn resume(&mut self, mode: ResumeMode) -> Result<(), DebuggerError> {
        let thread_id = self.require_stopped_focus()?;
        // Input stops at the request site already: output racing ahead of
        // the continued event must not interleave with a prompt.
        self.console.stop_input();
        let result = {
            let session = self.session()?;
            match mode {
                ResumeMode::Continue => session.continue_thread(thread_id).await,
                ResumeMode::StepOver => session.next(thread_id).await,
                ResumeMode::StepIn => session.step_in(thread_id).await,
                ResumeMode::StepOut => session.step_out(thread_id).await,
            }
        };
        match result {
            Ok(()) => {
                self.threads.mark_all_threads_running();
                self.state = SessionState::Running;
                Ok(())
            }
            Err(e) => {
                // Still stopped; give the prompt back.
                self.console.start_input();
                Err(e.into())
            }
        }
    }

    /// Break into a running program by pausing a thread.
    pub async fn break_in(&mut self) -> Result<(), DebuggerError> {
        if self.session.is_none() {
            return Err(DebuggerError::NoActiveSession);
        }
        if self.state != SessionState::Running {
            return Err(DebuggerError::NotRunning);
        }
        let thread_id = match self
            .adapter
            .async_stop_thread
            .or_else(|| self.threads.all_threads().next().map(|t| t.id()))
        {
            Some(id) => id,
            None => {
                // No cached threads yet; ask the adapter.
                let infos = self.session()?.threads().await?;
                self.threads.update_threads(&infos);
                self.threads
                    .all_threads()
                    .next()
                    .map(|t| t.id())
                    .ok_or_else(|| DebuggerError::not_found("a thread to pause"))?
            }
        };
        self.session()?.pause(thread_id).await?;
        Ok(())
    }

    // -- inspection --------------------------------------------------------

    /// Focus a different thread for subsequent inspection commands.
    pub fn set_focus_thread(&mut self, thread_id: i64) -> Result<(), DebuggerError> {
        if !self.threads.set_focus_thread(thread_id) {
            return Err(DebuggerError::not_found(format!("thread {thread_id}")));
        }
        Ok(())
    }

    /// Fetch a stack trace. The thread must exist and be stopped.
    pub async fn get_stack_trace(
        &mut self,
        thread_id: i64,
        levels: Option<i64>,
    ) -> Result<StackTraceResponseBody, DebuggerError> {
        let thread = self
            .threads
            .get_thread_by_id(thread_id)
            .ok_or_else(|| DebuggerError::not_found(format!("thread {thread_id}")))?;
        if !thread.is_stopped() {
            return Err(DebuggerError::NotStopped);
        }
        self.session()?
            .stack_trace(StackTraceArguments {
                thread_id,
                start_frame: None,
                levels,
            })
            .await
            .map_err(Into::into)
    }

    /// The frame at the focus thread's selected index.
    pub async fn get_current_stack_frame(&mut self) -> Result<StackFrame, DebuggerError> {
        let thread_id = self.require_stopped_focus()?;
        let selected = self
            .threads
            .get_thread_by_id(thread_id)
            .map(|t| t.selected_stack_frame())
            .unwrap_or(0);
        let trace = self
            .session()?
            .stack_trace(StackTraceArguments {
                thread_id,
                start_frame: None,
                levels: None,
            })
            .await?;
        trace
            .stack_frames
            .into_iter()
            .nth(selected)
            .ok_or_else(|| DebuggerError::not_found(format!("stack frame {selected}")))
    }

    /// Select a frame on a stopped thread, validating against the observed
    /// stack depth.
    pub async fn set_selected_stack_frame(
        &mut self,
        thread_id: i64,
        index: usize,
    ) -> Result<(), DebuggerError> {
        let thread = self
            .threads
            .get_thread_by_id(thread_id)
            .ok_or_else(|| DebuggerError::not_found(format!("thread {thread_id}")))?;
        if !thread.is_stopped() {
            return Err(DebuggerError::NotStopped);
        }
        let trace = self
            .session()?
            .stack_trace(StackTraceArguments {
                thread_id,
                start_frame: None,
                levels: None,
            })
            .await?;
        if index >= trace.stack_frames.len() {
            return Err(DebuggerError::not_found(format!("stack frame {index}")));
        }
        if let Some(thread) = self.threads.get_thread_mut(thread_id) {
            thread.set_selected_stack_frame(index);
        }
        Ok(())
    }

    /// Variables of the selected frame, by scope.
    ///
    /// With `name`, only the matching scope is queried. Without it, all
    /// non-expensive scopes are queried concurrently; expensive scopes are
    /// listed with absent variables. Scope order is the adapter's.
    pub async fn get_variables_by_scope(
        &mut self,
        name: Option<&str>,
    ) -> Result<Vec<ScopeVariables>, DebuggerError> {
        let frame = self.get_current_stack_frame().await?;
        let session = self.session()?;
        let scopes = session.scopes(frame.id).await?;

        if let Some(name) = name {
            let scope = scopes
                .into_iter()
                .find(|s| s.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| DebuggerError::not_found(format!("scope '{name}'")))?;
            let variables = session.variables(scope.variables_reference).await?;
            return Ok(vec![ScopeVariables {
                scope,
                variables: Some(variables),
            }]);
        }

        let queries = scopes.iter().map(|scope| {
            let expensive = scope.is_expensive();
            let reference = scope.variables_reference;
            async move {
                if expensive {
                    Ok(None)
                } else {
                    session.variables(reference).await.map(Some)
                }
            }
        });
        let results = join_all(queries).await;

        let mut out = Vec::with_capacity(scopes.len());
        for (scope, variables) in scopes.into_iter().zip(results) {
            out.push(ScopeVariables {
                scope,
                variables: variables?,
            });
        }
        Ok(out)
    }

    /// Flat passthrough to the adapter's `variables` request.
    pub async fn get_variables_by_reference(
        &mut self,
        reference: i64,
    ) -> Result<Vec<Variable>, DebuggerError> {
        self.session()?
            .variables(reference)
            .await
            .map_err(Into::into)
    }

    /// Evaluate an expression in REPL context, against the selected frame
    /// when stopped.
    pub async fn evaluate_expression(
        &mut self,
        text: &str,
        is_block: bool,
    ) -> Result<EvaluateResponseBody, DebuggerError> {
        if self.session.is_none() {
            return Err(DebuggerError::NoActiveSession);
        }
        if is_block && !self.adapter.supports_code_blocks {
            return Err(DebuggerError::UnsupportedCapability("code blocks"));
        }
        let frame_id = if self.state == SessionState::Stopped {
            self.get_current_stack_frame().await.ok().map(|f| f.id)
        } else {
            None
        };
        let expression = self.adapter.transform_expression(text, is_block);
        self.session()?
            .evaluate(EvaluateArguments {
                expression,
                frame_id,
                context: Some("repl".into()),
            })
            .await
            .map_err(Into::into)
    }

    /// Cached lines for a source, fetching by path or by reference.
    pub async fn get_source_lines(&mut self, source: &Source) -> Arc<Vec<String>> {
        if let Some(path) = &source.path {
            return self.source_cache.get_by_path(path);
        }
        if let Some(reference) = source.source_reference {
            if let Some(session) = self.session.as_ref() {
                let cache = &mut self.source_cache;
                return cache.get_by_reference(reference, |r| session.source(r)).await;
            }
        }
        Arc::new(vec!["<no source available>".to_string()])
    }

    /// The adapter's `info` report.
    pub async fn adapter_info(&self) -> Result<serde_json::Value, DebuggerError> {
        self.session()?.info().await.map_err(Into::into)
    }
}

#[derive(Debug, Clone, Copy)]
enum ResumeMode {
    Continue,
    StepOver,
    StepIn,
    StepOut,
}

impl std::fmt::Debug for Debugger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debugger")
            .field("adapter", &self.adapter.name)
            .field("state", &self.state)
            .field("epoch", &self.epoch)
            .field("threads", &self.threads.len())
            .field("breakpoints", &self.breakpoints.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SilentConsole;

    impl ConsoleIo for SilentConsole {
        fn output(&self, _: &str) {}
        fn output_line(&self, _: &str) {}
        fn start_input(&self) {}
        fn stop_input(&self) {}
        fn close(&self) {}
    }

    fn engine_without_session() -> Debugger {
        let adapter = AdapterDescriptor::generic("fake", "fake-dap");
        Debugger::with_factory(
            adapter,
            Arc::new(SilentConsole),
            Box::new(|| {
                Box::pin(async {
                    Err::<Session, DapError>(DapError::SpawnFailed(
                        "no adapter in this test".into(),
                    ))
                })
            }),
        )
    }

    #[test]
    fn state_display() {
        assert_eq!(SessionState::Initializing.to_string(), "initializing");
        assert_eq!(SessionState::Configuring.to_string(), "configuring");
        assert_eq!(SessionState::Running.to_string(), "running");
        assert_eq!(SessionState::Stopped.to_string(), "stopped");
        assert_eq!(SessionState::Terminated.to_string(), "terminated");
    }

    #[tokio::test]
    async fn engine_starts_without_session() {
        let dbg = engine_without_session();
        assert_eq!(dbg.state(), SessionState::Terminated);
        assert!(dbg.threads().is_empty());
        assert!(dbg.breakpoints().is_empty());
    }

    #[tokio::test]
    async fn launch_surfaces_factory_failure() {
        let mut dbg = engine_without_session();
        let err = dbg.launch().await.unwrap_err();
        assert!(matches!(err, DebuggerError::Adapter(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn breakpoints_before_launch_are_pending() {
        let mut dbg = engine_without_session();
        let added = dbg.set_source_breakpoint("/a.c", 7, false).await.unwrap();
        assert_eq!(added.index, 0);
        assert_eq!(added.message.as_deref(), Some(PENDING_BREAKPOINT_MESSAGE));
        // The breakpoint is in the registry even with no session.
        assert_eq!(dbg.get_all_breakpoints().len(), 1);
    }

    #[tokio::test]
    async fn function_breakpoint_requires_capability() {
        let mut dbg = engine_without_session();
        let err = dbg.set_function_breakpoint("main", false).await.unwrap_err();
        assert!(matches!(err, DebuggerError::UnsupportedCapability(_)));
    }

    #[tokio::test]
    async fn once_breakpoint_requires_capability() {
        let mut dbg = engine_without_session();
        let err = dbg.set_source_breakpoint("/a.c", 7, true).await.unwrap_err();
        assert!(matches!(err, DebuggerError::UnsupportedCapability(_)));
    }

    #[tokio::test]
    async fn operations_without_session_fail() {
        let mut dbg = engine_without_session();
        assert!(matches!(
            dbg.run().await.unwrap_err(),
            DebuggerError::NoActiveSession
        ));
        assert!(matches!(
            dbg.continue_execution().await.unwrap_err(),
            DebuggerError::NoActiveSession
        ));
        assert!(matches!(
            dbg.evaluate_expression("1", false).await.unwrap_err(),
            DebuggerError::NoActiveSession
        ));
        assert!(matches!(
            dbg.break_in().await.unwrap_err(),
            DebuggerError::NoActiveSession
        ));
        assert!(matches!(
            dbg.get_variables_by_reference(1).await.unwrap_err(),
            DebuggerError::NoActiveSession
        ));
    }

    #[tokio::test]
    async fn stack_trace_requires_known_thread() {
        let mut dbg = engine_without_session();
        let err = dbg.get_stack_trace(1, None).await.unwrap_err();
        assert!(matches!(err, DebuggerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn toggle_without_sync_flips_locally() {
        // With no program started there is nothing to reconcile, so the
        // toggle applies purely locally.
        let mut dbg = engine_without_session();
        let added = dbg.set_source_breakpoint("/a.c", 7, false).await.unwrap();
        let state = dbg.toggle_breakpoint(added.index).await.unwrap();
        assert_eq!(state, BreakpointState::Disabled);
        let state = dbg.toggle_breakpoint(added.index).await.unwrap();
        assert_eq!(state, BreakpointState::Enabled);
    }

    #[tokio::test]
    async fn delete_breakpoint_without_session() {
        let mut dbg = engine_without_session();
        let added = dbg.set_source_breakpoint("/a.c", 7, false).await.unwrap();
        dbg.delete_breakpoint(added.index).await.unwrap();
        assert!(dbg.get_breakpoint_by_index(added.index).is_err());
        // Indices are never reused.
        let again = dbg.set_source_breakpoint("/a.c", 7, false).await.unwrap();
        assert_ne!(again.index, added.index);
    }

    #[tokio::test]
    async fn source_lines_without_session() {
        let mut dbg = engine_without_session();
        let source = Source {
            name: None,
            path: None,
            source_reference: Some(4),
        };
        let lines = dbg.get_source_lines(&source).await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("no source available"));
    }
}
