//! CLI error types with miette diagnostics.
//!
//! Maps configuration and controller failures into user-facing errors with
//! help text and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use fbfuse_config::ConfigError;
use fbfuse_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const BIND: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(fbfuse::no_config),
        help("Pass an existing file with --config, or omit it to use the built-in defaults.")
    )]
    NoConfig { path: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(
        code(fbfuse::validation),
        help("Run: fbfuse check-config to see the effective configuration")
    )]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(fbfuse::config))]
    Config(ConfigError),

    // ── Server ───────────────────────────────────────────────────────
    #[error("Could not listen on {address}")]
    #[diagnostic(
        code(fbfuse::bind_failed),
        help("Choose another address with --host/--port or stop the process holding it.")
    )]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Master controller failed: {message}")]
    #[diagnostic(code(fbfuse::controller))]
    Controller { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    #[diagnostic(code(fbfuse::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Bind { .. } => exit_code::BIND,
            Self::Controller { .. } | Self::Io(_) | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::MissingFile { path } => Self::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config { message } => Self::Validation {
                field: "controller".into(),
                reason: message,
            },
            other => Self::Controller {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn config_errors_keep_their_exit_codes() {
        let missing: CliError = ConfigError::MissingFile {
            path: PathBuf::from("/etc/fbfuse.toml"),
        }
        .into();
        assert_eq!(missing.exit_code(), exit_code::CONFIG);
        assert_eq!(
            missing.to_string(),
            "Configuration file not found: /etc/fbfuse.toml"
        );

        let invalid: CliError = ConfigError::Validation {
            field: "controller.max_channels".into(),
            reason: "must be positive".into(),
        }
        .into();
        assert_eq!(invalid.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn core_failures_are_general() {
        let err: CliError = CoreError::ControllerStopped.into();
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }
}
