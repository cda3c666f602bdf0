// ── Core error types ──
//
// Parse and fetch errors never reach consumers as failures: a tick
// recovers them locally and surfaces only staleness. Command errors are
// always returned to the caller. `CoreError` covers setup paths.

use thiserror::Error;

use crate::model::{ArmMode, Source};

/// A payload did not have the structure the panel contract promises.
///
/// Unrecognized enumeration values are never a parse error; they map to
/// `Unknown` variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{payload} payload is not valid JSON: {message}")]
    InvalidJson { payload: Source, message: String },

    #[error("{payload} payload is missing required field `{field}`")]
    MissingField {
        payload: Source,
        field: &'static str,
    },

    #[error("unrecognized {payload} payload structure: {message}")]
    Structure { payload: Source, message: String },
}

impl ParseError {
    pub(crate) fn from_json(payload: Source, err: &serde_json::Error) -> Self {
        if err.is_syntax() || err.is_eof() {
            Self::InvalidJson {
                payload,
                message: err.to_string(),
            }
        } else {
            Self::Structure {
                payload,
                message: err.to_string(),
            }
        }
    }
}

/// Why one source failed within a tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] vesta_api::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("tick deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled by shutdown")]
    Cancelled,
}

impl FetchError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_auth())
    }

    /// Auth failures and shutdown are final; everything else gets
    /// another attempt while the policy allows.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => !e.is_auth(),
            Self::Parse(_) => true,
            Self::DeadlineExceeded | Self::Cancelled => false,
        }
    }
}

/// Failures of `set_arm_mode`. Always surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("A command targeting {target} is still converging")]
    InProgress { target: ArmMode },

    #[error("Panel did not reach {target} in time (last observed {observed})")]
    Timeout { target: ArmMode, observed: ArmMode },

    #[error("Command rejected: {reason}")]
    Rejected { reason: String },

    #[error("Command could not be delivered: {0}")]
    Transport(#[from] vesta_api::Error),

    #[error("Command abandoned before convergence")]
    Abandoned,
}

/// Errors from setting up or probing a panel connection.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Cannot connect to panel at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed (HTTP {status})")]
    AuthenticationFailed { status: u16 },

    #[error("Panel timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("Panel API error: {message}")]
    Api { message: String, status: Option<u16> },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<vesta_api::Error> for CoreError {
    fn from(err: vesta_api::Error) -> Self {
        match err {
            vesta_api::Error::Connection { url, message } => Self::ConnectionFailed {
                url,
                reason: message,
            },
            vesta_api::Error::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            vesta_api::Error::Auth { status } => Self::AuthenticationFailed { status },
            vesta_api::Error::Http { status, .. } => Self::Api {
                message: format!("HTTP {status}"),
                status: Some(status),
            },
            vesta_api::Error::Malformed { message, .. } => Self::Api {
                message,
                status: None,
            },
            vesta_api::Error::InvalidUrl(e) => Self::Config {
                message: format!("Invalid panel URL: {e}"),
            },
            vesta_api::Error::Client(message) => Self::Config { message },
        }
    }
}

impl From<FetchError> for CoreError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Transport(e) => e.into(),
            FetchError::Parse(e) => Self::Parse(e),
            FetchError::DeadlineExceeded => Self::Timeout { timeout_ms: 0 },
            FetchError::Cancelled => Self::Config {
                message: "operation cancelled".into(),
            },
        }
    }
}
