//! CLI error types with miette diagnostics.
//!
//! Maps config and core errors into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use chargepoint_config::ConfigError;
use chargepoint_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(chargepoint::no_config),
        help(
            "Create the file, or omit --config to use the default location:\n\
             {default_path}"
        )
    )]
    NoConfig { path: String, default_path: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(chargepoint::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(chargepoint::config),
        help("Check the TOML syntax and any CHARGEPOINT_* environment variables.")
    )]
    Config(ConfigError),

    // ── Runtime ──────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(chargepoint::core))]
    Core(#[from] CoreError),

    #[error("Failed to render state tree: {0}")]
    #[diagnostic(code(chargepoint::json))]
    Json(#[from] serde_json::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => Self::NoConfig {
                path: path.display().to_string(),
                default_path: chargepoint_config::config_path().display().to_string(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Core(_) | Self::Json(_) => exit_code::GENERAL,
        }
    }
}
