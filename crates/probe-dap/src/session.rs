//! DAP session transport client.
//!
//! A [`Session`] owns one conversation with a debug adapter: it frames and
//! sends requests, correlates responses by sequence number, and forwards
//! adapter events as an ordered [`AdapterEvent`] stream. Adapters normally
//! run as a child process speaking DAP on stdio; any byte-stream pair works
//! (tests drive a scripted adapter over `tokio::io::duplex`).

use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{timeout, Duration};

use crate::capabilities::AdapterCapabilities;
use crate::dispatch::Dispatcher;
use crate::error::DapError;
use crate::protocol::{
    AdapterEvent, BreakpointInfo, Capabilities, ContinueArguments, DisconnectArguments,
    EvaluateArguments, EvaluateResponseBody, Event, FunctionBreakpoint,
    InitializeRequestArguments, NextArguments, PauseArguments, Request, Response, Scope,
    ScopesResponseBody, SetBreakpointsArguments, SetBreakpointsResponseBody,
    SetExceptionBreakpointsArguments, SetFunctionBreakpointsArguments, Source, SourceArguments,
    SourceBreakpoint, SourceResponseBody, StackTraceArguments, StackTraceResponseBody,
    StepInArguments, StepOutArguments, ThreadInfo, ThreadsResponseBody, Variable,
    VariablesResponseBody,
};

/// Default timeout for requests (seconds).
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// A cloneable handle that can issue requests on a session.
///
/// Used when a request must outlive the borrow of the [`Session`] that
/// created it, e.g. a `launch` sent in the background while the engine
/// continues to process events.
#[derive(Debug, Clone)]
pub struct Requester {
    next_seq: Arc<AtomicI64>,
    dispatcher: Arc<Mutex<Dispatcher>>,
    writer_tx: mpsc::Sender<serde_json::Value>,
}

impl Requester {
    /// Send `command` and wait for its response body.
    ///
    /// `timeout_secs: None` waits indefinitely; adapters may legitimately
    /// defer some responses (e.g. `launch`) until configuration completes.
    pub async fn request_with_timeout(
        &self,
        command: &str,
        arguments: Option<serde_json::Value>,
        timeout_secs: Option<u64>,
    ) -> Result<Option<serde_json::Value>, DapError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let rx = self.dispatcher.lock().await.register(seq);

        let message = serde_json::to_value(Request::new(seq, command, arguments))
            .map_err(|e| DapError::Transport(e.to_string()))?;
        self.writer_tx
            .send(message)
            .await
            .map_err(|_| DapError::Closed)?;

        let response = self.await_response(command, seq, rx, timeout_secs).await?;
        if response.success {
            Ok(response.body)
        } else {
            Err(DapError::Rejected {
                command: command.into(),
                message: response
                    .message
                    .unwrap_or_else(|| "request failed".into()),
            })
        }
    }

    /// Send `command` and wait for its response with the default timeout.
    pub async fn request(
        &self,
        command: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<Option<serde_json::Value>, DapError> {
        self.request_with_timeout(command, arguments, Some(REQUEST_TIMEOUT_SECS))
            .await
    }

    async fn await_response(
        &self,
        command: &str,
        seq: i64,
        rx: oneshot::Receiver<Response>,
        timeout_secs: Option<u64>,
    ) -> Result<Response, DapError> {
        let received = match timeout_secs {
            Some(secs) => match timeout(Duration::from_secs(secs), rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.dispatcher.lock().await.forget(seq);
                    return Err(DapError::Timeout {
                        command: command.into(),
                    });
                }
            },
            None => rx.await,
        };
        received.map_err(|_| DapError::Closed)
    }
}

/// One DAP connection and its conversation state.
pub struct Session {
    requester: Requester,
    events_rx: Option<mpsc::UnboundedReceiver<AdapterEvent>>,
    capabilities: AdapterCapabilities,
    raw_capabilities: Capabilities,
    child: Option<Child>,
}

impl Session {
    /// Spawn a debug adapter as a child process speaking DAP on stdio.
    pub fn spawn(command: &str, args: &[String]) -> Result<Self, DapError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DapError::SpawnFailed(format!("{command}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DapError::SpawnFailed("could not capture stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DapError::SpawnFailed("could not capture stdout".into()))?;

        let mut session = Self::connect(stdout, stdin);
        session.child = Some(child);
        Ok(session)
    }

    /// Build a session over an arbitrary byte-stream pair.
    pub fn connect<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let dispatcher = Arc::new(Mutex::new(Dispatcher::new()));
        let (writer_tx, mut writer_rx) = mpsc::channel::<serde_json::Value>(64);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        // Writer task: frames and sends outgoing messages.
        tokio::spawn(async move {
            let mut writer = writer;
            while let Some(message) = writer_rx.recv().await {
                if crate::transport::write_message(&mut writer, &message)
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        // Reader task: decodes incoming messages, routes responses to
        // waiting requests and forwards events in arrival order.
        let reader_dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            loop {
                let message = match crate::transport::read_message(&mut reader).await {
                    Ok(Some(message)) => message,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("adapter transport error: {e}");
                        break;
                    }
                };
                match message.get("type").and_then(|t| t.as_str()) {
                    Some("response") => match serde_json::from_value::<Response>(message) {
                        Ok(response) => reader_dispatcher.lock().await.resolve(response),
                        Err(e) => tracing::warn!("malformed response: {e}"),
                    },
                    Some("event") => match serde_json::from_value::<Event>(message) {
                        Ok(event) => {
                            let _ = events_tx.send(AdapterEvent::decode(event));
                        }
                        Err(e) => tracing::warn!("malformed event: {e}"),
                    },
                    other => {
                        // Reverse requests (e.g. runInTerminal) are not handled.
                        tracing::debug!("ignoring adapter message of type {other:?}");
                    }
                }
            }
            reader_dispatcher.lock().await.fail_all();
            let _ = events_tx.send(AdapterEvent::AdapterExited);
        });

        Self {
            requester: Requester {
                next_seq: Arc::new(AtomicI64::new(1)),
                dispatcher,
                writer_tx,
            },
            events_rx: Some(events_rx),
            capabilities: AdapterCapabilities::default(),
            raw_capabilities: Capabilities::default(),
            child: None,
        }
    }

    /// Take the ordered event stream. Yields `None` after
    /// [`AdapterEvent::AdapterExited`] once the transport is gone.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<AdapterEvent>> {
        self.events_rx.take()
    }

    /// A cloneable request handle for this session.
    pub fn requester(&self) -> Requester {
        self.requester.clone()
    }

    /// The resolved adapter capabilities. Meaningful after [`Session::initialize`].
    pub fn capabilities(&self) -> &AdapterCapabilities {
        &self.capabilities
    }

    /// The raw capabilities record from the `initialize` response.
    pub fn raw_capabilities(&self) -> &Capabilities {
        &self.raw_capabilities
    }

    /// Send `command` and wait for its response body.
    pub async fn request(
        &self,
        command: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<Option<serde_json::Value>, DapError> {
        self.requester.request(command, arguments).await
    }

    // -- typed requests ----------------------------------------------------

    /// Perform the `initialize` handshake and record adapter capabilities.
    pub async fn initialize(
        &mut self,
        args: InitializeRequestArguments,
    ) -> Result<&AdapterCapabilities, DapError> {
        let body = self.request("initialize", Some(to_args(&args)?)).await?;
        self.raw_capabilities = match body {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| DapError::InvalidResponse(format!("capabilities: {e}")))?,
            None => Capabilities::default(),
        };
        self.capabilities = AdapterCapabilities::from_initialize_response(&self.raw_capabilities);
        Ok(&self.capabilities)
    }

    /// Send `launch` with pre-transformed adapter arguments.
    ///
    /// Some adapters defer the launch response until `configurationDone`;
    /// callers that must not block use [`Session::requester`] with no
    /// timeout instead.
    pub async fn launch(&self, arguments: serde_json::Value) -> Result<(), DapError> {
        self.request("launch", Some(arguments)).await.map(drop)
    }

    /// Send `attach` with pre-transformed adapter arguments.
    pub async fn attach(&self, arguments: serde_json::Value) -> Result<(), DapError> {
        self.request("attach", Some(arguments)).await.map(drop)
    }

    /// Send `disconnect`.
    pub async fn disconnect(&self) -> Result<(), DapError> {
        self.request(
            "disconnect",
            Some(to_args(&DisconnectArguments::default())?),
        )
        .await
        .map(drop)
    }

    /// Send `setBreakpoints`, replacing every breakpoint of `source`.
    ///
    /// The response carries one entry per requested breakpoint, in request
    /// order.
    pub async fn set_breakpoints(
        &self,
        source: Source,
        breakpoints: Vec<SourceBreakpoint>,
    ) -> Result<Vec<BreakpointInfo>, DapError> {
        let args = SetBreakpointsArguments {
            source,
            breakpoints,
        };
        let body = self.request("setBreakpoints", Some(to_args(&args)?)).await?;
        let body: SetBreakpointsResponseBody = decode_body(body, "setBreakpoints")?;
        Ok(body.breakpoints)
    }

    /// Send `setFunctionBreakpoints`, replacing all function breakpoints.
    pub async fn set_function_breakpoints(
        &self,
        breakpoints: Vec<FunctionBreakpoint>,
    ) -> Result<Vec<BreakpointInfo>, DapError> {
        let args = SetFunctionBreakpointsArguments { breakpoints };
        let body = self
            .request("setFunctionBreakpoints", Some(to_args(&args)?))
            .await?;
        let body: SetBreakpointsResponseBody = decode_body(body, "setFunctionBreakpoints")?;
        Ok(body.breakpoints)
    }

    /// Send `setExceptionBreakpoints` with the given filter ids.
    pub async fn set_exception_breakpoints(&self, filters: Vec<String>) -> Result<(), DapError> {
        let args = SetExceptionBreakpointsArguments { filters };
        self.request("setExceptionBreakpoints", Some(to_args(&args)?))
            .await
            .map(drop)
    }

    /// Send `configurationDone`.
    pub async fn configuration_done(&self) -> Result<(), DapError> {
        self.request("configurationDone", None).await.map(drop)
    }

    /// Fetch the current thread list.
    pub async fn threads(&self) -> Result<Vec<ThreadInfo>, DapError> {
        let body = self.request("threads", None).await?;
        let body: ThreadsResponseBody = decode_body(body, "threads")?;
        Ok(body.threads)
    }

    /// Fetch a stack trace for one thread.
    pub async fn stack_trace(
        &self,
        args: StackTraceArguments,
    ) -> Result<StackTraceResponseBody, DapError> {
        let body = self.request("stackTrace", Some(to_args(&args)?)).await?;
        decode_body(body, "stackTrace")
    }

    /// Fetch the scopes of one frame.
    pub async fn scopes(&self, frame_id: i64) -> Result<Vec<Scope>, DapError> {
        let body = self
            .request("scopes", Some(serde_json::json!({ "frameId": frame_id })))
            .await?;
        let body: ScopesResponseBody = decode_body(body, "scopes")?;
        Ok(body.scopes)
    }

    /// Fetch the variables behind a variables reference.
    pub async fn variables(&self, variables_reference: i64) -> Result<Vec<Variable>, DapError> {
        let body = self
            .request(
                "variables",
                Some(serde_json::json!({ "variablesReference": variables_reference })),
            )
            .await?;
        let body: VariablesResponseBody = decode_body(body, "variables")?;
        Ok(body.variables)
    }

    /// Ask the adapter to pause a thread.
    pub async fn pause(&self, thread_id: i64) -> Result<(), DapError> {
        self.request("pause", Some(to_args(&PauseArguments { thread_id })?))
            .await
            .map(drop)
    }

    /// Resume a thread.
    pub async fn continue_thread(&self, thread_id: i64) -> Result<(), DapError> {
        self.request("continue", Some(to_args(&ContinueArguments { thread_id })?))
            .await
            .map(drop)
    }

    /// Step over on a thread.
    pub async fn next(&self, thread_id: i64) -> Result<(), DapError> {
        self.request("next", Some(to_args(&NextArguments { thread_id })?))
            .await
            .map(drop)
    }

    /// Step into on a thread.
    pub async fn step_in(&self, thread_id: i64) -> Result<(), DapError> {
        self.request("stepIn", Some(to_args(&StepInArguments { thread_id })?))
            .await
            .map(drop)
    }

    /// Step out on a thread.
    pub async fn step_out(&self, thread_id: i64) -> Result<(), DapError> {
        self.request("stepOut", Some(to_args(&StepOutArguments { thread_id })?))
            .await
            .map(drop)
    }

    /// Evaluate an expression.
    pub async fn evaluate(
        &self,
        args: EvaluateArguments,
    ) -> Result<EvaluateResponseBody, DapError> {
        let body = self.request("evaluate", Some(to_args(&args)?)).await?;
        decode_body(body, "evaluate")
    }

    /// Fetch the full text of a source identified by reference.
    pub async fn source(&self, source_reference: i64) -> Result<String, DapError> {
        let args = SourceArguments { source_reference };
        let body = self.request("source", Some(to_args(&args)?)).await?;
        let body: SourceResponseBody = decode_body(body, "source")?;
        Ok(body.content)
    }

    /// Fetch the adapter's `info` report (adapter-specific body).
    pub async fn info(&self) -> Result<serde_json::Value, DapError> {
        let body = self.request("info", None).await?;
        Ok(body.unwrap_or(serde_json::Value::Null))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("capabilities", &self.capabilities)
            .field("has_child", &self.child.is_some())
            .finish()
    }
}

fn to_args<T: serde::Serialize>(args: &T) -> Result<serde_json::Value, DapError> {
    serde_json::to_value(args).map_err(|e| DapError::Transport(e.to_string()))
}

fn decode_body<T: serde::de::DeserializeOwned>(
    body: Option<serde_json::Value>,
    command: &str,
) -> Result<T, DapError> {
    let body = body
        .ok_or_else(|| DapError::InvalidResponse(format!("{command}: missing response body")))?;
    serde_json::from_value(body).map_err(|e| DapError::InvalidResponse(format!("{command}: {e}")))
}
