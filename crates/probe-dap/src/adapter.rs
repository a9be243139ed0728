//! Adapter descriptors.
//!
//! A descriptor tells the engine how to reach one debug adapter: the
//! process to spawn, whether to launch or attach, the raw argument blobs
//! from configuration, and the adapter-specific transforms applied to
//! those blobs and to REPL expressions.

use serde_json::Value;

/// How a session takes control of the debuggee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchAction {
    /// Start the debuggee under the adapter.
    Launch,
    /// Attach to an already-running debuggee.
    Attach,
}

/// Known adapter families, selecting argument and expression quirks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdapterKind {
    /// No transformation; arguments and expressions pass through untouched.
    #[default]
    Generic,
    /// debugpy (Python).
    DebugPy,
    /// lldb-dap (C/C++/Rust).
    Lldb,
}

impl AdapterKind {
    /// Parse a kind name from configuration. Unknown names are generic.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "debugpy" | "python" => AdapterKind::DebugPy,
            "lldb" | "lldb-dap" | "codelldb" => AdapterKind::Lldb,
            _ => AdapterKind::Generic,
        }
    }
}

/// Everything the engine needs to know about one debug adapter.
#[derive(Debug, Clone)]
pub struct AdapterDescriptor {
    /// Display name, also sent as the DAP `adapterID`.
    pub name: String,
    /// Adapter family for argument/expression quirks.
    pub kind: AdapterKind,
    /// Executable that speaks DAP on stdio.
    pub command: String,
    /// Arguments for the adapter executable.
    pub args: Vec<String>,
    /// Launch or attach.
    pub action: LaunchAction,
    /// Raw `launch` argument blob from configuration.
    pub launch_arguments: Value,
    /// Raw `attach` argument blob from configuration.
    pub attach_arguments: Value,
    /// Thread the adapter prefers for an attach-mode break-in.
    pub async_stop_thread: Option<i64>,
    /// Whether multi-line code blocks may be submitted for evaluation.
    pub supports_code_blocks: bool,
    /// Whether the adapter signals readiness for evaluations with a custom
    /// `readyForEvaluations` event; when false the client assumes readiness
    /// as soon as configuration opens.
    pub wait_for_ready_signal: bool,
    /// Output categories that are not echoed to the console.
    pub mute_output_categories: Vec<String>,
    /// Exception filter ids sent on `run`; `None` uses the adapter's
    /// advertised defaults.
    pub exception_filters: Option<Vec<String>>,
}

impl AdapterDescriptor {
    /// A pass-through descriptor for `command`, launching with empty
    /// arguments. Useful as a base for tests and ad-hoc sessions.
    pub fn generic(name: &str, command: &str) -> Self {
        Self {
            name: name.into(),
            kind: AdapterKind::Generic,
            command: command.into(),
            args: Vec::new(),
            action: LaunchAction::Launch,
            launch_arguments: Value::Object(Default::default()),
            attach_arguments: Value::Object(Default::default()),
            async_stop_thread: None,
            supports_code_blocks: false,
            wait_for_ready_signal: false,
            mute_output_categories: vec!["telemetry".into()],
            exception_filters: None,
        }
    }

    /// Transform the configured launch arguments into what this adapter
    /// family expects.
    pub fn transform_launch_arguments(&self, mut args: Value) -> Value {
        match self.kind {
            AdapterKind::Generic => args,
            AdapterKind::DebugPy => {
                // debugpy echoes debuggee output only when asked to.
                if let Some(map) = args.as_object_mut() {
                    map.entry("redirectOutput").or_insert(Value::Bool(true));
                }
                args
            }
            AdapterKind::Lldb => {
                if let Some(map) = args.as_object_mut() {
                    map.entry("stopOnEntry").or_insert(Value::Bool(false));
                }
                args
            }
        }
    }

    /// Transform the configured attach arguments.
    pub fn transform_attach_arguments(&self, mut args: Value) -> Value {
        match self.kind {
            AdapterKind::Generic | AdapterKind::Lldb => args,
            AdapterKind::DebugPy => {
                if let Some(map) = args.as_object_mut() {
                    map.entry("justMyCode").or_insert(Value::Bool(false));
                }
                args
            }
        }
    }

    /// Transform a REPL expression before sending it in `evaluate`.
    pub fn transform_expression(&self, expression: &str, is_block: bool) -> String {
        match self.kind {
            AdapterKind::Generic | AdapterKind::Lldb => expression.to_string(),
            AdapterKind::DebugPy => {
                // debugpy executes a multi-line suite only when the input
                // ends with a newline.
                if is_block && !expression.ends_with('\n') {
                    format!("{expression}\n")
                } else {
                    expression.to_string()
                }
            }
        }
    }
}
