//! Configuration error types.

use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading or creating config files.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse failure.
    #[error("config parse error: {0}")]
    Parse(String),

    /// Could not create the default config file.
    #[error("failed to create default config: {0}")]
    CreateDefault(String),

    /// A setting has an invalid value.
    #[error("invalid config: {field}: {message}")]
    Validation {
        /// The offending field, e.g. "preset.python.command".
        field: String,
        /// Why the value is invalid.
        message: String,
    },

    /// A requested preset does not exist.
    #[error("no such preset: {0}")]
    UnknownPreset(String),
}
