// Panel HTTP client
//
// Wraps `reqwest::Client` with panel URL construction, Basic Auth, the
// fixed AJAX header set, and failure classification. Endpoint knowledge
// lives in `endpoints.rs`; this module only moves bytes.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{ACCEPT, REFERER};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::{Form, Method, PanelTransport, TransportConfig};

/// Build the panel root URL (`http://{host}/` or `https://{host}/`).
pub fn panel_base_url(host: &str, use_https: bool) -> Result<Url, Error> {
    let scheme = if use_https { "https" } else { "http" };
    let host = host.trim().trim_end_matches('/');
    Ok(Url::parse(&format!("{scheme}://{host}/"))?)
}

/// Raw HTTP client for the panel's local CGI interface.
///
/// Every request carries Basic Auth, `X-Requested-With: XMLHttpRequest`,
/// a `Referer` pointing at the panel root, and `Accept: application/json`.
/// Bodies are returned untouched once they are known to be JSON.
pub struct PanelClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: SecretString,
    timeout: Duration,
}

impl PanelClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(
        base_url: Url,
        username: String,
        password: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            username,
            password,
            timeout: transport.timeout,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// The timeout is only used for error reporting; the caller's client
    /// is responsible for enforcing it.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        username: String,
        password: SecretString,
    ) -> Self {
        Self {
            http,
            base_url,
            username,
            password,
            timeout: TransportConfig::default().timeout,
        }
    }

    /// The panel base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The Basic Auth user name.
    pub fn username(&self) -> &str {
        &self.username
    }

    fn classify(&self, url: &Url, err: &reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else if err.is_decode() || err.is_body() {
            Error::Malformed {
                message: err.to_string(),
                body: String::new(),
            }
        } else {
            Error::Connection {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl PanelTransport for PanelClient {
    async fn request(&self, method: Method, path: &str, form: Option<Form>) -> Result<Bytes, Error> {
        let url = self.base_url.join(path)?;
        debug!(method = method.as_str(), %url, "panel request");

        let builder = match method {
            Method::Get => self.http.get(url.clone()),
            Method::Post => self.http.post(url.clone()).form(&form.unwrap_or_default()),
        };

        let resp = builder
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .header("X-Requested-With", "XMLHttpRequest")
            .header(REFERER, self.base_url.as_str())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(&url, &e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::Auth {
                status: status.as_u16(),
            });
        }

        let body = resp.bytes().await.map_err(|e| self.classify(&url, &e))?;

        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        // Some firmware sends JSON as text/html, so sniff the body instead
        // of trusting the content type.
        if let Err(e) = serde_json::from_slice::<serde::de::IgnoredAny>(&body) {
            return Err(Error::Malformed {
                message: format!("expected JSON from {path}: {e}"),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        trace!(bytes = body.len(), "panel response");
        Ok(body)
    }
}
