use thiserror::Error;

/// Top-level error type for the `vesta-api` crate.
///
/// Every wire failure is classified into one of these variants so that
/// retry decisions in `vesta-core` never have to inspect HTTP details.
/// Variants carry plain data (no `reqwest::Error`) and are cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Host unreachable, connection refused, DNS failure, or broken stream.
    #[error("Cannot reach panel at {url}: {message}")]
    Connection { url: String, message: String },

    /// The per-request timeout elapsed.
    #[error("Request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    // ── HTTP ────────────────────────────────────────────────────────
    /// Credentials rejected (HTTP 401 or 403).
    #[error("Panel rejected credentials (HTTP {status})")]
    Auth { status: u16 },

    /// Any other non-2xx status.
    #[error("Panel returned HTTP {status}")]
    Http { status: u16, body: String },

    // ── Data ────────────────────────────────────────────────────────
    /// Body could not be read or is not JSON, with the raw body for debugging.
    #[error("Malformed response: {message}")]
    Malformed { message: String, body: String },

    // ── Construction ────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The underlying HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl Error {
    /// Returns `true` if the panel rejected the credentials.
    ///
    /// Retrying will not fix these, so callers surface them immediately.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::Timeout { .. } | Self::Malformed { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::Auth { .. } | Self::InvalidUrl(_) | Self::Client(_) => false,
        }
    }

    /// HTTP status code, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status } | Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
