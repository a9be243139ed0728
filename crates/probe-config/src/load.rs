//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use crate::config::ConfigFile;
use crate::error::ConfigError;

/// Content written into a newly-created default config file.
const DEFAULT_CONFIG_CONTENT: &str = r#"# probe configuration
# Define one [preset.<name>] table per debug adapter.

# [log]
# level = "info"

# [preset.python]
# adapter = "debugpy"
# command = "python"
# args = ["-m", "debugpy.adapter"]
#
# [preset.python.launch]
# program = "app.py"
"#;

/// Return the default config file path: `$HOME/.config/probe/config.toml`,
/// falling back to the working directory when no home is known.
pub fn default_config_path() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".config/probe/config.toml");
    }
    PathBuf::from("probe.toml")
}

/// Load the config file at `path`, creating a commented-out default when
/// it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError`] on I/O failure, parse failure, or validation
/// failure.
pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, DEFAULT_CONFIG_CONTENT)
            .map_err(|e| ConfigError::CreateDefault(e.to_string()))?;
        tracing::info!("created default config at {}", path.display());
    }
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

/// Parse a TOML string directly into a validated [`ConfigFile`].
///
/// # Errors
///
/// Returns [`ConfigError`] on parse or validation failure.
pub fn load_from_str(toml_str: &str) -> Result<ConfigFile, ConfigError> {
    let config: ConfigFile =
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &ConfigFile) -> Result<(), ConfigError> {
    for (name, preset) in &config.preset {
        if preset.command.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: format!("preset.{name}.command"),
                message: "must not be empty".into(),
            });
        }
    }
    const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
    if !LEVELS.contains(&config.log.level.to_ascii_lowercase().as_str()) {
        return Err(ConfigError::Validation {
            field: "log.level".into(),
            message: format!("unknown level '{}'", config.log.level),
        });
    }
    Ok(())
}
