//! CLI error types with miette diagnostics.
//!
//! Maps core, command and config failures into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use vesta_config::ConfigError;
use vesta_core::{ArmMode, CommandError, CoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to panel at {url}")]
    #[diagnostic(
        code(vesta::connection_failed),
        help(
            "Check that the panel is powered and reachable on the local network.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Panel did not answer: {reason}")]
    #[diagnostic(
        code(vesta::panel_unavailable),
        help("Run with -v for per-source details, or retry in a few seconds.")
    )]
    PanelUnavailable { reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed")]
    #[diagnostic(
        code(vesta::auth_failed),
        help(
            "Verify the panel username and password.\n\
             Run: vesta config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(vesta::no_credentials),
        help(
            "Configure credentials with: vesta config init\n\
             Or set the VESTA_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(vesta::not_found),
        help("Run: vesta {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Commands ─────────────────────────────────────────────────────

    #[error("A command targeting {target} is already in flight")]
    #[diagnostic(
        code(vesta::command_in_progress),
        help("Wait for the pending command to confirm or time out.")
    )]
    CommandInProgress { target: ArmMode },

    #[error("Panel did not reach {target}; still reports {observed}")]
    #[diagnostic(
        code(vesta::command_timeout),
        help("The panel may refuse to arm with open zones. Check `vesta devices --triggered`.")
    )]
    CommandTimeout { target: ArmMode, observed: ArmMode },

    #[error("Panel rejected the command: {reason}")]
    #[diagnostic(code(vesta::command_rejected))]
    CommandRejected { reason: String },

    #[error("Command was abandoned before the panel confirmed it")]
    #[diagnostic(code(vesta::command_abandoned))]
    CommandAbandoned,

    // ── API ──────────────────────────────────────────────────────────

    #[error("Panel API error: {message}")]
    #[diagnostic(code(vesta::api_error))]
    Api { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vesta::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(vesta::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: vesta config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(vesta::no_config),
        help(
            "Create one with: vesta config init\n\
             Expected at: {path}\n\
             Or pass --host for a one-off connection."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(vesta::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out after {millis} ms")]
    #[diagnostic(
        code(vesta::timeout),
        help("Increase timeout with --timeout or check panel responsiveness.")
    )]
    Timeout { millis: u64 },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(vesta::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(vesta::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::PanelUnavailable { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::CommandInProgress { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } | Self::CommandTimeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { .. } => Self::AuthFailed {
                profile: "current".into(),
            },
            CoreError::Timeout { timeout_ms } => Self::Timeout { millis: timeout_ms },
            CoreError::Api { message, .. } => Self::Api { message },
            CoreError::Parse(e) => Self::Api {
                message: e.to_string(),
            },
            CoreError::Config { message } => Self::Validation {
                field: "panel".into(),
                reason: message,
            },
        }
    }
}

impl From<CommandError> for CliError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::InProgress { target } => Self::CommandInProgress { target },
            CommandError::Timeout { target, observed } => Self::CommandTimeout { target, observed },
            CommandError::Rejected { reason } => Self::CommandRejected { reason },
            CommandError::Transport(e) => CoreError::from(e).into(),
            CommandError::Abandoned => Self::CommandAbandoned,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownProfile { profile } => Self::ProfileNotFound {
                name: profile,
                available: String::new(),
            },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            other => Self::Config(other),
        }
    }
}
