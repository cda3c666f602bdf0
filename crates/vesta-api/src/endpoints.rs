// Panel endpoint contract
//
// The four CGI endpoints the panel exposes, expressed as an extension
// trait over any `PanelTransport`. Paths and form field names are fixed
// by panel firmware and must not change.

use std::future::Future;

use bytes::Bytes;

use crate::error::Error;
use crate::transport::{Method, PanelTransport};

/// `GET action/panelCondGet`: arm mode and panel diagnostics.
pub const PANEL_STATUS: &str = "action/panelCondGet";
/// `GET action/deviceListGet`: enrolled devices and their state.
pub const DEVICE_LIST: &str = "action/deviceListGet";
/// `POST action/logsGet` with `max_count`: event history, newest first.
pub const EVENT_LOG: &str = "action/logsGet";
/// `POST action/panelCondPost` with `area` and `mode`: arm-mode command.
pub const PANEL_SET: &str = "action/panelCondPost";

/// Typed endpoint calls, available on every [`PanelTransport`].
pub trait PanelApi: PanelTransport {
    /// Fetch the raw panel status body.
    fn fetch_status(&self) -> impl Future<Output = Result<Bytes, Error>> + Send {
        self.request(Method::Get, PANEL_STATUS, None)
    }

    /// Fetch the raw device inventory body.
    fn fetch_devices(&self) -> impl Future<Output = Result<Bytes, Error>> + Send {
        self.request(Method::Get, DEVICE_LIST, None)
    }

    /// Fetch up to `max_count` event log rows.
    fn fetch_events(&self, max_count: u32) -> impl Future<Output = Result<Bytes, Error>> + Send {
        self.request(
            Method::Post,
            EVENT_LOG,
            Some(vec![("max_count", max_count.to_string())]),
        )
    }

    /// Ask the panel to switch `area` to the numeric mode `code`.
    fn post_arm_mode(&self, area: u8, code: u8) -> impl Future<Output = Result<Bytes, Error>> + Send {
        self.request(
            Method::Post,
            PANEL_SET,
            Some(vec![("area", area.to_string()), ("mode", code.to_string())]),
        )
    }
}

impl<T: PanelTransport + ?Sized> PanelApi for T {}
