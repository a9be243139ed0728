//! Adapter event handling and the engine handle.
//!
//! Each session's event stream is drained by one pump task. The pump feeds
//! events into [`Debugger::handle_event`] under the engine lock, one at a
//! time and in arrival order, then acts on the returned [`FollowUp`]
//! outside the handler: relaunching after termination in launch mode, or
//! signalling host exit in attach mode. Handler failures are logged, never
//! thrown into the event loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, MutexGuard};

use probe_dap::{
    AdapterEvent, BreakpointEventBody, ContinuedEventBody, LaunchAction, StackTraceArguments,
    StoppedEventBody, ThreadEventBody,
};

use crate::breakpoint::BreakpointState;
use crate::debugger::{Debugger, SessionState};
use crate::error::DebuggerError;
use crate::source_cache::line_at;

/// What the event pump must do after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    /// Nothing.
    None,
    /// The program is gone in launch mode: open a fresh session.
    Relaunch,
    /// The program is gone in attach mode: the host should exit.
    ExitHost,
}

impl Debugger {
    /// Process one adapter event.
    ///
    /// `epoch` tags the session that produced the event; events from a
    /// torn-down session are stale and ignored.
    pub async fn handle_event(&mut self, epoch: u64, event: AdapterEvent) -> FollowUp {
        if epoch != self.epoch() {
            tracing::debug!(?event, "ignoring event from torn-down session");
            return FollowUp::None;
        }
        match event {
            AdapterEvent::Initialized => {
                self.handle_initialized().await;
                FollowUp::None
            }
            AdapterEvent::Output(body) => {
                let category = body.category.as_deref().unwrap_or("console");
                if !self
                    .adapter()
                    .mute_output_categories
                    .iter()
                    .any(|muted| muted == category)
                {
                    self.console().output(&body.output);
                }
                FollowUp::None
            }
            AdapterEvent::Continued(body) => {
                self.handle_continued(body);
                FollowUp::None
            }
            AdapterEvent::Stopped(body) => {
                self.handle_stopped(body).await;
                FollowUp::None
            }
            AdapterEvent::Thread(body) => {
                self.handle_thread_event(body).await;
                FollowUp::None
            }
            AdapterEvent::Exited(body) => {
                self.console()
                    .output_line(&format!("Program exited with code {}.", body.exit_code));
                self.handle_termination()
            }
            AdapterEvent::Terminated(_) => self.handle_termination(),
            AdapterEvent::AdapterExited => {
                if self.state() == SessionState::Initializing && self.disconnecting {
                    // The teardown we ourselves initiated during relaunch.
                    return FollowUp::None;
                }
                if self.state() != SessionState::Terminated {
                    self.console().output_line("Debug adapter exited.");
                }
                self.handle_termination()
            }
            AdapterEvent::Breakpoint(body) => {
                self.handle_breakpoint_event(body);
                FollowUp::None
            }
            AdapterEvent::Custom { event, .. } => {
                self.handle_custom_event(&event);
                FollowUp::None
            }
        }
    }

    async fn handle_initialized(&mut self) {
        match self.adapter().action {
            LaunchAction::Launch => {
                self.set_state(SessionState::Configuring);
                if self.ready_for_evaluations {
                    self.console().start_input();
                }
            }
            LaunchAction::Attach => {
                // Attach skips the configuring window from the user's
                // perspective: configure, then force a stop.
                if let Err(e) = self.finish_attach().await {
                    tracing::warn!("attach configuration failed: {e}");
                    self.console()
                        .output_line(&format!("Failed to configure attached session: {e}"));
                }
            }
        }
    }

    async fn finish_attach(&mut self) -> Result<(), DebuggerError> {
        if self.adapter_caps().supports_configuration_done_request {
            self.session_ref()?.configuration_done().await?;
        }
        self.reset_all_breakpoints().await?;
        let infos = self.session_ref()?.threads().await?;
        self.threads_mut().update_threads(&infos);
        self.set_state(SessionState::Running);

        let target = self
            .adapter()
            .async_stop_thread
            .or_else(|| self.threads().all_threads().next().map(|t| t.id()));
        match target {
            Some(thread_id) => {
                self.session_ref()?.pause(thread_id).await?;
            }
            None => {
                // Nothing to stop; hand the prompt back to the user.
                self.console().start_input();
            }
        }
        Ok(())
    }

    fn handle_continued(&mut self, body: ContinuedEventBody) {
        if body.all_threads_continued.unwrap_or(false) {
            self.threads_mut().mark_all_threads_running();
        } else {
            self.threads_mut().mark_thread_running(body.thread_id);
        }
        if self.threads().all_threads_running() && self.state() == SessionState::Stopped {
            self.set_state(SessionState::Running);
            self.console().stop_input();
        }
    }

    pub(crate) async fn handle_stopped(&mut self, body: StoppedEventBody) {
        self.disable_hit_once_breakpoint(&body).await;

        let first_stop = self.threads().all_threads_running();

        // Refresh the thread list so names and new threads are current.
        let infos = match self.session_ref() {
            Ok(session) => session.threads().await.ok(),
            Err(_) => None,
        };
        if let Some(infos) = infos {
            self.threads_mut().update_threads(&infos);
        }

        if body.all_threads_stopped.unwrap_or(false) || body.thread_id.is_none() {
            self.threads_mut().mark_all_threads_stopped();
        }
        if let Some(thread_id) = body.thread_id {
            self.threads_mut().mark_thread_stopped(thread_id);
        }

        let focus = body
            .thread_id
            .filter(|id| self.threads().get_thread_by_id(*id).is_some())
            .or_else(|| self.threads().first_stopped_thread().map(|t| t.id()));
        if let Some(focus) = focus {
            self.threads_mut().set_focus_thread(focus);
        }

        if first_stop {
            self.print_stop_banner(&body).await;
        }

        self.set_state(SessionState::Stopped);
        self.console().start_input();

        for command in self.registered_commands() {
            command.on_stopped(self).await;
        }
    }

    /// One-shot semantics: a stop attributed to a once breakpoint disables
    /// it and pushes the shrunken batches before control returns to the
    /// user.
    async fn disable_hit_once_breakpoint(&mut self, body: &StoppedEventBody) {
        if !self.adapter_caps().supports_breakpoint_id_on_stop {
            return;
        }
        let Some(breakpoint_id) = body.breakpoint_id else {
            return;
        };
        let index = match self.breakpoints().get_breakpoint_by_id(breakpoint_id) {
            Ok(bp) if bp.state() == BreakpointState::Once => bp.index(),
            _ => return,
        };
        self.breakpoints_mut()
            .force_state(index, BreakpointState::Disabled);
        if let Err(e) = self.reset_all_breakpoints().await {
            tracing::warn!("failed to re-send breakpoints after one-shot hit: {e}");
        }
    }

    async fn print_stop_banner(&mut self, body: &StoppedEventBody) {
        let Some(thread_id) = self
            .threads()
            .focus_thread_id()
            .or_else(|| body.thread_id)
        else {
            return;
        };
        let reason = body
            .description
            .clone()
            .unwrap_or_else(|| body.reason.clone());

        let trace = match self.session_ref() {
            Ok(session) => {
                session
                    .stack_trace(StackTraceArguments {
                        thread_id,
                        start_frame: None,
                        levels: Some(1),
                    })
                    .await
            }
            Err(_) => return,
        };
        let frame = match trace {
            Ok(trace) => trace.stack_frames.into_iter().next(),
            Err(e) => {
                tracing::debug!("no stack for stop banner: {e}");
                None
            }
        };
        let Some(frame) = frame else {
            self.console().output_line(&format!("Stopped ({reason})"));
            return;
        };

        match frame.source {
            Some(source) => {
                let lines = self.get_source_lines(&source).await;
                let text = line_at(&lines, frame.line).unwrap_or("").trim();
                let name = source
                    .name
                    .as_deref()
                    .or(source.path.as_deref())
                    .unwrap_or("<unknown>");
                self.console().output_line(&format!(
                    "Stopped ({reason}) at {name}:{}: {text}",
                    frame.line
                ));
            }
            None => {
                self.console()
                    .output_line(&format!("Stopped ({reason}) in {}", frame.name));
            }
        }
    }

    async fn handle_thread_event(&mut self, body: ThreadEventBody) {
        match body.reason.as_str() {
            "started" => {
                self.threads_mut()
                    .add_thread(body.thread_id, format!("thread {}", body.thread_id));
                // Re-query so the placeholder name becomes the real one.
                let infos = match self.session_ref() {
                    Ok(session) => session.threads().await,
                    Err(_) => return,
                };
                match infos {
                    Ok(infos) => self.threads_mut().update_threads(&infos),
                    Err(e) => tracing::warn!("thread list refresh failed: {e}"),
                }
            }
            "exited" => {
                self.threads_mut().remove_thread(body.thread_id);
            }
            other => tracing::debug!("unhandled thread event reason: {other}"),
        }
    }

    /// The program is gone. Launch mode reopens the prompt and asks for a
    /// relaunch; attach mode asks the host to exit.
    fn handle_termination(&mut self) -> FollowUp {
        if self.state() == SessionState::Terminated {
            return FollowUp::None;
        }
        self.set_state(SessionState::Terminated);
        self.drop_session();
        match self.adapter().action {
            LaunchAction::Launch => {
                self.console().start_input();
                FollowUp::Relaunch
            }
            LaunchAction::Attach => FollowUp::ExitHost,
        }
    }

    fn handle_breakpoint_event(&mut self, body: BreakpointEventBody) {
        if !matches!(body.reason.as_str(), "new" | "changed") {
            return;
        }
        let Some(adapter_id) = body.breakpoint.id else {
            return;
        };
        match self.breakpoints().get_breakpoint_by_id(adapter_id) {
            Ok(bp) => {
                let index = bp.index();
                let _ = self
                    .breakpoints_mut()
                    .set_breakpoint_verified(index, body.breakpoint.verified);
                if body.breakpoint.message.is_some() {
                    let _ = self
                        .breakpoints_mut()
                        .set_breakpoint_message(index, body.breakpoint.message);
                }
            }
            Err(_) => {
                tracing::debug!("breakpoint event for unknown adapter id {adapter_id}");
            }
        }
    }

    fn handle_custom_event(&mut self, event: &str) {
        if event == "readyForEvaluations" {
            self.ready_for_evaluations = true;
            if self.state() == SessionState::Configuring {
                self.console().start_input();
            }
        } else {
            tracing::debug!("unhandled custom event: {event}");
        }
    }
}

/// Cloneable handle owning the engine lock.
///
/// Command dispatch and the event pumps go through this handle, which
/// realizes the cooperative model: one lock, so a command handler and an
/// event handler never run in parallel.
#[derive(Clone)]
pub struct DebuggerHandle {
    inner: Arc<Mutex<Debugger>>,
    shutdown_tx: mpsc::UnboundedSender<i32>,
}

impl DebuggerHandle {
    /// Wrap an engine. The returned receiver yields the host exit status
    /// when the engine asks the host to terminate (attach-mode program
    /// exit, fatal launch failure).
    pub fn new(mut debugger: Debugger) -> (Self, mpsc::UnboundedReceiver<i32>) {
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        debugger.set_shutdown_notifier(shutdown_tx.clone());
        (
            Self {
                inner: Arc::new(Mutex::new(debugger)),
                shutdown_tx,
            },
            shutdown_rx,
        )
    }

    /// Lock the engine for a command handler.
    pub async fn lock(&self) -> MutexGuard<'_, Debugger> {
        self.inner.lock().await
    }

    /// Launch a fresh debugging session and start pumping its events.
    pub async fn launch(&self) -> Result<(), DebuggerError> {
        self.lock().await.launch().await?;
        self.spawn_event_pump().await;
        Ok(())
    }

    /// Relaunch after termination and start pumping the new session.
    pub async fn relaunch(&self) -> Result<(), DebuggerError> {
        self.lock().await.relaunch().await?;
        self.spawn_event_pump().await;
        Ok(())
    }

    /// Disconnect and drop the session.
    pub async fn close(&self) {
        self.lock().await.close_session().await;
    }

    fn spawn_event_pump(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let this = self.clone();
        Box::pin(async move {
            let stream = this.lock().await.take_event_stream();
            if let Some((epoch, events)) = stream {
                let handle = this.clone();
                tokio::spawn(run_event_pump(handle, epoch, events));
            }
        })
    }

    fn request_shutdown(&self, status: i32) {
        let _ = self.shutdown_tx.send(status);
    }
}

async fn run_event_pump(
    handle: DebuggerHandle,
    epoch: u64,
    mut events: mpsc::UnboundedReceiver<AdapterEvent>,
) {
    while let Some(event) = events.recv().await {
        let follow_up = handle.lock().await.handle_event(epoch, event).await;
        match follow_up {
            FollowUp::None => {}
            FollowUp::Relaunch => {
                if let Err(e) = handle.relaunch().await {
                    // Legacy behavior: a failed relaunch terminates the
                    // host with status 0.
                    tracing::error!("relaunch failed: {e}");
                    let console = handle.lock().await.console();
                    console.output_line(&format!("Failed to restart the debug session: {e}"));
                    handle.request_shutdown(0);
                    return;
                }
            }
            FollowUp::ExitHost => {
                handle.request_shutdown(0);
                return;
            }
        }
    }
}
