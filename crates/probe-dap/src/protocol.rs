//! DAP protocol message types.
//!
//! Implements the Debug Adapter Protocol message structures with
//! serde Serialize/Deserialize support, plus the typed [`AdapterEvent`]
//! stream item delivered to session consumers.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Base protocol messages
// ---------------------------------------------------------------------------

/// A DAP request message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Sequence number.
    pub seq: i64,
    /// Always "request".
    #[serde(rename = "type")]
    pub message_type: String,
    /// The command to execute.
    pub command: String,
    /// Command arguments (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
}

impl Request {
    /// Build a request message for `command` with the given arguments.
    pub fn new(seq: i64, command: &str, arguments: Option<serde_json::Value>) -> Self {
        Self {
            seq,
            message_type: "request".into(),
            command: command.into(),
            arguments,
        }
    }
}

/// A DAP response message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Sequence number.
    pub seq: i64,
    /// Always "response".
    #[serde(rename = "type")]
    pub message_type: String,
    /// Sequence number of the corresponding request.
    pub request_seq: i64,
    /// Whether the request was successful.
    pub success: bool,
    /// The command this response is for.
    pub command: String,
    /// Error message if `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response body (command-specific).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

/// A DAP event message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Sequence number.
    pub seq: i64,
    /// Always "event".
    #[serde(rename = "type")]
    pub message_type: String,
    /// The event type.
    pub event: String,
    /// Event body (event-specific).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Initialize
// ---------------------------------------------------------------------------

/// Arguments for the `initialize` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequestArguments {
    /// ID of the client.
    #[serde(rename = "clientID", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Human-readable name of the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// ID of the debug adapter.
    #[serde(rename = "adapterID")]
    pub adapter_id: String,
    /// Client locale (e.g. "en-US").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Whether lines are 1-based.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_start_at1: Option<bool>,
    /// Whether columns are 1-based.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns_start_at1: Option<bool>,
    /// Path format: "path" or "uri".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_format: Option<String>,
    /// Whether the client supports variable type information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_variable_type: Option<bool>,
}

impl InitializeRequestArguments {
    /// Standard arguments announcing this client.
    pub fn for_adapter(adapter_id: &str) -> Self {
        Self {
            client_id: Some("probe".into()),
            client_name: Some("probe debugger".into()),
            adapter_id: adapter_id.into(),
            locale: Some("en-US".into()),
            lines_start_at1: Some(true),
            columns_start_at1: Some(true),
            path_format: Some("path".into()),
            supports_variable_type: Some(true),
        }
    }
}

/// Capabilities returned by the debug adapter in the `initialize` response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// The adapter supports the `configurationDone` request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_configuration_done_request: Option<bool>,
    /// The adapter supports function breakpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_function_breakpoints: Option<bool>,
    /// The adapter supports conditional breakpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_conditional_breakpoints: Option<bool>,
    /// Stop events carry the id of the breakpoint that was hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_breakpoint_id_on_stop: Option<bool>,
    /// The adapter supports the `terminate` request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_terminate_request: Option<bool>,
    /// Available exception breakpoint filters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_breakpoint_filters: Option<Vec<ExceptionBreakpointsFilter>>,
}

/// An exception filter option advertised by the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionBreakpointsFilter {
    /// Internal id of the filter, used in `setExceptionBreakpoints`.
    pub filter: String,
    /// Display name of the filter.
    pub label: String,
    /// Whether the filter is enabled by default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
}

// ---------------------------------------------------------------------------
// Breakpoints
// ---------------------------------------------------------------------------

/// A source location.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Short name of the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// File system path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Source reference (for sources without a file path).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<i64>,
}

impl Source {
    /// A source identified by filesystem path.
    pub fn from_path(path: &str) -> Self {
        let name = std::path::Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Self {
            name,
            path: Some(path.into()),
            source_reference: None,
        }
    }
}

/// A source breakpoint as sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakpoint {
    /// The source line of the breakpoint (1-based).
    pub line: i64,
    /// Optional column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<i64>,
    /// Condition expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// A function breakpoint as sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionBreakpoint {
    /// Name of the function to break in.
    pub name: String,
    /// Condition expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Arguments for the `setBreakpoints` request.
///
/// Replaces all breakpoints previously set for the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsArguments {
    /// The source to set breakpoints for.
    pub source: Source,
    /// The complete set of breakpoints for that source.
    pub breakpoints: Vec<SourceBreakpoint>,
}

/// Arguments for the `setFunctionBreakpoints` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetFunctionBreakpointsArguments {
    /// The complete set of function breakpoints.
    pub breakpoints: Vec<FunctionBreakpoint>,
}

/// Arguments for the `setExceptionBreakpoints` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetExceptionBreakpointsArguments {
    /// Ids of the exception filters to enable.
    pub filters: Vec<String>,
}

/// A breakpoint as reported by the adapter, in `setBreakpoints`-family
/// responses and in `breakpoint` events.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointInfo {
    /// Adapter-assigned identifier for the breakpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Whether the breakpoint has been verified.
    pub verified: bool,
    /// Optional adapter message (e.g. why the breakpoint is unverified).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Resolved source location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// Resolved line of the breakpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
    /// Resolved column of the breakpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<i64>,
}

/// Response body for the `setBreakpoints` family of requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsResponseBody {
    /// One entry per requested breakpoint, in request order.
    pub breakpoints: Vec<BreakpointInfo>,
}

// ---------------------------------------------------------------------------
// Threads, stack, scopes, variables
// ---------------------------------------------------------------------------

/// A thread in the debuggee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadInfo {
    /// Unique identifier of the thread.
    pub id: i64,
    /// Human-readable name of the thread.
    pub name: String,
}

/// Response body for the `threads` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadsResponseBody {
    /// All threads currently known to the adapter.
    pub threads: Vec<ThreadInfo>,
}

/// Arguments for the `stackTrace` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceArguments {
    /// The thread whose stack to fetch.
    pub thread_id: i64,
    /// Index of the first frame to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_frame: Option<i64>,
    /// Maximum number of frames to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<i64>,
}

/// A stack frame in the call stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    /// Unique identifier for the stack frame.
    pub id: i64,
    /// Name of the frame (function name).
    pub name: String,
    /// Source location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// Line within the source (1-based).
    pub line: i64,
    /// Column within the source.
    pub column: i64,
}

/// Response body for the `stackTrace` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponseBody {
    /// The frames, topmost first.
    pub stack_frames: Vec<StackFrame>,
    /// Total number of frames available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<i64>,
}

/// A scope (container for variables).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Name of the scope (e.g. "Locals", "Globals").
    pub name: String,
    /// Variables reference for this scope.
    pub variables_reference: i64,
    /// Whether fetching the scope's variables is expensive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expensive: Option<bool>,
}

impl Scope {
    /// Whether the adapter marked this scope expensive to resolve.
    pub fn is_expensive(&self) -> bool {
        self.expensive.unwrap_or(false)
    }
}

/// Response body for the `scopes` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopesResponseBody {
    /// The scopes of the frame, in adapter-reported order.
    pub scopes: Vec<Scope>,
}

/// A variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// Name of the variable.
    pub name: String,
    /// Value of the variable as a string.
    pub value: String,
    /// Type of the variable.
    #[serde(rename = "type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_type: Option<String>,
    /// If > 0, the variable has children accessed via this reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables_reference: Option<i64>,
}

/// Response body for the `variables` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesResponseBody {
    /// The child variables.
    pub variables: Vec<Variable>,
}

// ---------------------------------------------------------------------------
// Flow control
// ---------------------------------------------------------------------------

/// Arguments for the `continue` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueArguments {
    /// The thread to continue.
    pub thread_id: i64,
}

/// Arguments for the `next` (step over) request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextArguments {
    /// The thread to step.
    pub thread_id: i64,
}

/// Arguments for the `stepIn` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInArguments {
    /// The thread to step.
    pub thread_id: i64,
}

/// Arguments for the `stepOut` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutArguments {
    /// The thread to step.
    pub thread_id: i64,
}

/// Arguments for the `pause` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseArguments {
    /// The thread to pause.
    pub thread_id: i64,
}

/// Arguments for the `disconnect` request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectArguments {
    /// Whether to terminate the debuggee.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminate_debuggee: Option<bool>,
}

// ---------------------------------------------------------------------------
// Evaluate and source
// ---------------------------------------------------------------------------

/// Arguments for the `evaluate` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateArguments {
    /// The expression to evaluate.
    pub expression: String,
    /// Stack frame in whose context to evaluate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<i64>,
    /// Context: "watch", "repl", "hover", "clipboard".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Response body for the `evaluate` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponseBody {
    /// The result string.
    pub result: String,
    /// Type of the result.
    #[serde(rename = "type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
    /// If > 0, the result has children.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables_reference: Option<i64>,
}

/// Arguments for the `source` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceArguments {
    /// Reference of the source to fetch.
    pub source_reference: i64,
}

/// Response body for the `source` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceResponseBody {
    /// Full text of the source.
    pub content: String,
}

// ---------------------------------------------------------------------------
// Event bodies
// ---------------------------------------------------------------------------

/// Body of the `stopped` event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEventBody {
    /// The reason for the stop ("breakpoint", "step", "pause", ...).
    pub reason: String,
    /// Description of the stop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Thread that stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    /// Id of the breakpoint that was hit, when the adapter reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakpoint_id: Option<i64>,
    /// Whether all threads are stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_threads_stopped: Option<bool>,
    /// Additional text (e.g. exception details).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Body of the `continued` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuedEventBody {
    /// Thread that resumed.
    pub thread_id: i64,
    /// Whether all threads resumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_threads_continued: Option<bool>,
}

/// Body of the `output` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEventBody {
    /// Output category: "console", "stdout", "stderr", "telemetry".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// The output text.
    pub output: String,
}

/// Body of the `thread` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadEventBody {
    /// "started" or "exited".
    pub reason: String,
    /// The thread in question.
    pub thread_id: i64,
}

/// Body of the `exited` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitedEventBody {
    /// The exit code of the debuggee.
    pub exit_code: i64,
}

/// Body of the `terminated` event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminatedEventBody {
    /// Restart data; if present, a restart is requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<serde_json::Value>,
}

/// Body of the `breakpoint` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointEventBody {
    /// "new", "changed" or "removed".
    pub reason: String,
    /// The breakpoint as the adapter now sees it.
    pub breakpoint: BreakpointInfo,
}

// ---------------------------------------------------------------------------
// Typed event stream
// ---------------------------------------------------------------------------

/// A decoded adapter event, delivered in arrival order on the session's
/// event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    /// The adapter is ready for configuration requests.
    Initialized,
    /// Debuggee or adapter output.
    Output(OutputEventBody),
    /// One or more threads resumed.
    Continued(ContinuedEventBody),
    /// The debuggee stopped.
    Stopped(StoppedEventBody),
    /// A thread started or exited.
    Thread(ThreadEventBody),
    /// The debuggee exited with a code.
    Exited(ExitedEventBody),
    /// The debug session ended.
    Terminated(TerminatedEventBody),
    /// A breakpoint's adapter-side state changed.
    Breakpoint(BreakpointEventBody),
    /// The adapter process or transport went away.
    AdapterExited,
    /// Any event this client has no dedicated handling for.
    Custom {
        /// The event name.
        event: String,
        /// The raw event body.
        body: serde_json::Value,
    },
}

impl AdapterEvent {
    /// Decode a wire event into its typed form.
    ///
    /// Events with a malformed body for their kind are downgraded to
    /// [`AdapterEvent::Custom`] so a misbehaving adapter cannot stall the
    /// stream.
    pub fn decode(event: Event) -> AdapterEvent {
        let body = event.body.unwrap_or(serde_json::Value::Null);
        fn parse<T: serde::de::DeserializeOwned>(body: &serde_json::Value) -> Option<T> {
            serde_json::from_value(body.clone()).ok()
        }
        match event.event.as_str() {
            "initialized" => AdapterEvent::Initialized,
            "output" => match parse(&body) {
                Some(b) => AdapterEvent::Output(b),
                None => AdapterEvent::Custom { event: event.event, body },
            },
            "continued" => match parse(&body) {
                Some(b) => AdapterEvent::Continued(b),
                None => AdapterEvent::Custom { event: event.event, body },
            },
            "stopped" => match parse(&body) {
                Some(b) => AdapterEvent::Stopped(b),
                None => AdapterEvent::Custom { event: event.event, body },
            },
            "thread" => match parse(&body) {
                Some(b) => AdapterEvent::Thread(b),
                None => AdapterEvent::Custom { event: event.event, body },
            },
            "exited" => match parse(&body) {
                Some(b) => AdapterEvent::Exited(b),
                None => AdapterEvent::Custom { event: event.event, body },
            },
            "terminated" => AdapterEvent::Terminated(parse(&body).unwrap_or_default()),
            "breakpoint" => match parse(&body) {
                Some(b) => AdapterEvent::Breakpoint(b),
                None => AdapterEvent::Custom { event: event.event, body },
            },
            _ => AdapterEvent::Custom {
                event: event.event,
                body,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_event(name: &str, body: serde_json::Value) -> Event {
        Event {
            seq: 1,
            message_type: "event".into(),
            event: name.into(),
            body: Some(body),
        }
    }

    #[test]
    fn protocol_initialize_request_serde() {
        let args = InitializeRequestArguments::for_adapter("lldb");
        let json = serde_json::to_value(&args).unwrap();
        assert_eq!(json["adapterID"], "lldb");
        assert_eq!(json["clientID"], "probe");
        assert_eq!(json["linesStartAt1"], true);
        let decoded: InitializeRequestArguments = serde_json::from_value(json).unwrap();
        assert_eq!(args, decoded);
    }

    #[test]
    fn protocol_capabilities_camel_case() {
        let json = serde_json::json!({
            "supportsConfigurationDoneRequest": true,
            "supportsFunctionBreakpoints": true,
            "supportsBreakpointIdOnStop": true,
        });
        let caps: Capabilities = serde_json::from_value(json).unwrap();
        assert_eq!(caps.supports_configuration_done_request, Some(true));
        assert_eq!(caps.supports_function_breakpoints, Some(true));
        assert_eq!(caps.supports_breakpoint_id_on_stop, Some(true));
        assert_eq!(caps.supports_terminate_request, None);
    }

    #[test]
    fn protocol_source_from_path() {
        let source = Source::from_path("/src/app/main.c");
        assert_eq!(source.name.as_deref(), Some("main.c"));
        assert_eq!(source.path.as_deref(), Some("/src/app/main.c"));
        assert_eq!(source.source_reference, None);
    }

    #[test]
    fn protocol_set_breakpoints_arguments_serde() {
        let args = SetBreakpointsArguments {
            source: Source::from_path("/a.c"),
            breakpoints: vec![SourceBreakpoint {
                line: 7,
                column: None,
                condition: None,
            }],
        };
        let json = serde_json::to_value(&args).unwrap();
        assert_eq!(json["source"]["path"], "/a.c");
        assert_eq!(json["breakpoints"][0]["line"], 7);
    }

    #[test]
    fn protocol_breakpoint_info_optional_id() {
        let json = serde_json::json!({ "verified": true });
        let info: BreakpointInfo = serde_json::from_value(json).unwrap();
        assert!(info.verified);
        assert_eq!(info.id, None);
        assert_eq!(info.message, None);
    }

    #[test]
    fn protocol_stopped_event_body_serde() {
        let json = serde_json::json!({
            "reason": "breakpoint",
            "threadId": 1,
            "breakpointId": 0,
            "allThreadsStopped": true,
        });
        let body: StoppedEventBody = serde_json::from_value(json).unwrap();
        assert_eq!(body.reason, "breakpoint");
        assert_eq!(body.thread_id, Some(1));
        assert_eq!(body.breakpoint_id, Some(0));
        assert_eq!(body.all_threads_stopped, Some(true));
    }

    #[test]
    fn protocol_stack_frame_serde() {
        let frame = StackFrame {
            id: 1,
            name: "main".into(),
            source: Some(Source::from_path("/src/main.c")),
            line: 10,
            column: 1,
        };
        let json = serde_json::to_string(&frame).unwrap();
        let decoded: StackFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(frame, decoded);
    }

    #[test]
    fn protocol_scope_expensive_defaults_false() {
        let scope = Scope {
            name: "Registers".into(),
            variables_reference: 7,
            expensive: None,
        };
        assert!(!scope.is_expensive());
        let scope = Scope {
            expensive: Some(true),
            ..scope
        };
        assert!(scope.is_expensive());
    }

    #[test]
    fn protocol_evaluate_serde() {
        let args = EvaluateArguments {
            expression: "x + y".into(),
            frame_id: Some(3),
            context: Some("repl".into()),
        };
        let json = serde_json::to_value(&args).unwrap();
        assert_eq!(json["frameId"], 3);
        assert_eq!(json["context"], "repl");
    }

    #[test]
    fn event_decode_initialized() {
        let evt = wire_event("initialized", serde_json::json!({}));
        assert_eq!(AdapterEvent::decode(evt), AdapterEvent::Initialized);
    }

    #[test]
    fn event_decode_stopped() {
        let evt = wire_event(
            "stopped",
            serde_json::json!({ "reason": "step", "threadId": 2 }),
        );
        match AdapterEvent::decode(evt) {
            AdapterEvent::Stopped(body) => {
                assert_eq!(body.reason, "step");
                assert_eq!(body.thread_id, Some(2));
            }
            other => panic!("expected Stopped, got {other:?}"),
        }
    }

    #[test]
    fn event_decode_terminated_without_body() {
        let evt = Event {
            seq: 9,
            message_type: "event".into(),
            event: "terminated".into(),
            body: None,
        };
        assert_eq!(
            AdapterEvent::decode(evt),
            AdapterEvent::Terminated(TerminatedEventBody::default())
        );
    }

    #[test]
    fn event_decode_unknown_is_custom() {
        let evt = wire_event("readyForEvaluations", serde_json::json!({ "ok": true }));
        match AdapterEvent::decode(evt) {
            AdapterEvent::Custom { event, body } => {
                assert_eq!(event, "readyForEvaluations");
                assert_eq!(body["ok"], true);
            }
            other => panic!("expected Custom, got {other:?}"),
        }
    }

    #[test]
    fn event_decode_malformed_body_downgrades_to_custom() {
        // "exited" requires an exitCode; a string body must not panic.
        let evt = wire_event("exited", serde_json::json!("oops"));
        match AdapterEvent::decode(evt) {
            AdapterEvent::Custom { event, .. } => assert_eq!(event, "exited"),
            other => panic!("expected Custom, got {other:?}"),
        }
    }

    #[test]
    fn protocol_breakpoint_event_serde() {
        let json = serde_json::json!({
            "reason": "changed",
            "breakpoint": { "id": 42, "verified": true }
        });
        let body: BreakpointEventBody = serde_json::from_value(json).unwrap();
        assert_eq!(body.reason, "changed");
        assert_eq!(body.breakpoint.id, Some(42));
        assert!(body.breakpoint.verified);
    }
}
