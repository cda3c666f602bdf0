// Shared transport contract and client configuration.
//
// `PanelTransport` is the seam between the wire and the reconciliation
// core: the core is generic over it so tests can swap in a scripted fake.
// No retries happen at this layer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Error;

/// URL-encoded form fields for a POST body.
pub type Form = Vec<(&'static str, String)>;

/// HTTP methods used by the panel API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A single authenticated request/response exchange with the panel.
///
/// Implementations attach Basic Auth and the fixed header set, serialize
/// `form` as `application/x-www-form-urlencoded`, enforce their own
/// per-request timeout, and classify failures into [`Error`].
pub trait PanelTransport: Send + Sync {
    fn request(
        &self,
        method: Method,
        path: &str,
        form: Option<Form>,
    ) -> impl Future<Output = Result<Bytes, Error>> + Send;
}

impl<T: PanelTransport> PanelTransport for Arc<T> {
    fn request(
        &self,
        method: Method,
        path: &str,
        form: Option<Form>,
    ) -> impl Future<Output = Result<Bytes, Error>> + Send {
        (**self).request(method, path, form)
    }
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Accept self-signed certificates (panels ship with them).
    pub accept_invalid_certs: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            accept_invalid_certs: true,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// Redirects are never followed: the panel answers unauthenticated
    /// requests with a redirect to its login page.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("vesta-sync/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(|e| Error::Client(format!("failed to build HTTP client: {e}")))
    }
}
