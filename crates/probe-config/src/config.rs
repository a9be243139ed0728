//! Configuration schema: logging plus named adapter presets.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a preset takes control of the debuggee.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetAction {
    /// Start the program under the adapter.
    #[default]
    Launch,
    /// Attach to a running program.
    Attach,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log verbosity: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file path; a platform default is used when absent.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// One named debug-adapter preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Adapter family name (e.g. "debugpy", "lldb", "generic").
    #[serde(default = "default_adapter_name")]
    pub adapter: String,
    /// Executable that speaks DAP on stdio.
    pub command: String,
    /// Arguments for the adapter executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Launch or attach.
    #[serde(default)]
    pub action: PresetAction,
    /// Raw `launch` argument table, passed through to the adapter.
    #[serde(default)]
    pub launch: Option<toml::Value>,
    /// Raw `attach` argument table, passed through to the adapter.
    #[serde(default)]
    pub attach: Option<toml::Value>,
    /// Thread the adapter prefers for an attach-mode break-in.
    #[serde(default)]
    pub async_stop_thread: Option<i64>,
    /// Whether multi-line code blocks may be evaluated.
    #[serde(default)]
    pub supports_code_blocks: bool,
    /// Whether the adapter signals evaluation readiness with a custom
    /// event instead of being ready immediately.
    #[serde(default)]
    pub wait_for_ready_signal: bool,
    /// Output categories that are not echoed to the console.
    #[serde(default = "default_mute_output")]
    pub mute_output: Vec<String>,
    /// Exception filter ids to enable; adapter defaults when absent.
    #[serde(default)]
    pub exception_filters: Option<Vec<String>>,
}

fn default_adapter_name() -> String {
    "generic".to_string()
}

fn default_mute_output() -> Vec<String> {
    vec!["telemetry".to_string()]
}

impl Preset {
    /// The launch argument table as JSON, ready for the DAP request.
    pub fn launch_arguments_json(&self) -> serde_json::Value {
        toml_to_json(self.launch.as_ref())
    }

    /// The attach argument table as JSON, ready for the DAP request.
    pub fn attach_arguments_json(&self) -> serde_json::Value {
        toml_to_json(self.attach.as_ref())
    }
}

fn toml_to_json(value: Option<&toml::Value>) -> serde_json::Value {
    value
        .and_then(|v| serde_json::to_value(v).ok())
        .unwrap_or_else(|| serde_json::Value::Object(Default::default()))
}

/// The whole configuration file.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
    /// Named adapter presets.
    #[serde(default)]
    pub preset: BTreeMap<String, Preset>,
}

impl ConfigFile {
    /// Look up a preset by name.
    pub fn preset(&self, name: &str) -> Option<&Preset> {
        self.preset.get(name)
    }

    /// Names of all presets, sorted.
    pub fn preset_names(&self) -> Vec<&str> {
        self.preset.keys().map(String::as_str).collect()
    }
}
