// Raw panel payload models
//
// Serde types mirroring the panel's JSON exactly as firmware sends it.
// Panel firmware is loose about scalar types ("1" vs 1 vs true), so the
// scalar fields go through the `lenient` helpers. Field semantics (enum
// mapping, required-field checks) belong to `vesta-core`.

use serde::Deserialize;
use serde_json::Value;

/// `panelCondGet` body. Firmware wraps the fields in `updates` on some
/// models and sends them flat on others.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusEnvelope {
    #[serde(default)]
    pub updates: Option<RawPanelStatus>,
    #[serde(flatten)]
    pub flat: RawPanelStatus,
}

impl StatusEnvelope {
    /// The status fields, preferring the `updates` wrapper when present.
    pub fn into_status(self) -> RawPanelStatus {
        self.updates.unwrap_or(self.flat)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPanelStatus {
    /// Arm mode of area 1 (`Disarm`, `Arm`, `Home`, `Night`).
    #[serde(default, rename = "mode_a1", deserialize_with = "lenient::opt_string")]
    pub mode: Option<String>,
    /// Free-text backup battery status.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub battery: Option<String>,
    /// GSM signal strength, nominally 0-100.
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub sig_gsm: Option<i64>,
    /// `1` when mains power has failed.
    #[serde(default, deserialize_with = "lenient::opt_flag")]
    pub ac_fail: Option<bool>,
}

/// `deviceListGet` body. Rows are kept as `Value` so one malformed row
/// can be skipped without losing the rest.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceListEnvelope {
    #[serde(default)]
    pub senrows: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDevice {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub area: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub zone: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    /// Device type label, e.g. `"Door Contact"` or `"PIR"`.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub type_f: Option<String>,
    /// Status label, e.g. `"Door Open"` or `"Normal"`.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_flag")]
    pub battery_ok: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_flag")]
    pub tamper_ok: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub rssi: Option<String>,
}

/// `logsGet` body. Older firmware names the array `events`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventLogEnvelope {
    #[serde(default)]
    pub logrows: Option<Vec<Value>>,
    #[serde(default)]
    pub events: Option<Vec<Value>>,
}

impl EventLogEnvelope {
    pub fn into_rows(self) -> Option<Vec<Value>> {
        self.logrows.or(self.events)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLogEntry {
    /// Panel-assigned sequence number, when the firmware provides one.
    #[serde(default)]
    pub uid: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub event: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub zone: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub area: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub user: Option<String>,
}

/// `panelCondPost` acknowledgement; `result == 1` means accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandResponse {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub result: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub message: Option<String>,
}

/// Deserializers that accept the scalar shapes panel firmware produces.
pub mod lenient {
    use serde::{Deserialize, Deserializer, de::Error as _};
    use serde_json::Value;

    /// Render a scalar as text. Objects and arrays are rejected.
    pub fn scalar_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        let value = Value::deserialize(d)?;
        scalar_text(&value)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| D::Error::custom(format!("expected a non-empty scalar, got {value}")))
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value.as_ref().and_then(scalar_text))
    }

    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn opt_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::Bool(b)) => Some(b),
            Some(Value::Number(n)) => n.as_i64().map(|v| v == 1),
            Some(Value::String(s)) => Some(s.trim() == "1" || s.trim().eq_ignore_ascii_case("true")),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_prefers_updates_wrapper() {
        let env: StatusEnvelope = serde_json::from_value(json!({
            "updates": { "mode_a1": "Arm", "sig_gsm": "71", "ac_fail": "0" },
            "mode_a1": "Disarm"
        }))
        .expect("valid status");
        let status = env.into_status();
        assert_eq!(status.mode.as_deref(), Some("Arm"));
        assert_eq!(status.sig_gsm, Some(71));
        assert_eq!(status.ac_fail, Some(false));
    }

    #[test]
    fn status_accepts_flat_payload() {
        let env: StatusEnvelope =
            serde_json::from_value(json!({ "mode_a1": "Home", "battery": "Normal" }))
                .expect("valid status");
        let status = env.into_status();
        assert_eq!(status.mode.as_deref(), Some("Home"));
        assert_eq!(status.battery.as_deref(), Some("Normal"));
        assert_eq!(status.sig_gsm, None);
    }

    #[test]
    fn device_flags_accept_strings_numbers_and_bools() {
        let dev: RawDevice = serde_json::from_value(json!({
            "id": 17, "zone": "3", "battery_ok": "1", "tamper_ok": false
        }))
        .expect("valid device");
        assert_eq!(dev.id, "17");
        assert_eq!(dev.zone, Some(3));
        assert_eq!(dev.battery_ok, Some(true));
        assert_eq!(dev.tamper_ok, Some(false));
    }

    #[test]
    fn device_requires_id() {
        assert!(serde_json::from_value::<RawDevice>(json!({ "name": "Hall" })).is_err());
        assert!(serde_json::from_value::<RawDevice>(json!({ "id": "" })).is_err());
    }

    #[test]
    fn event_log_falls_back_to_events_key() {
        let env: EventLogEnvelope =
            serde_json::from_value(json!({ "events": [{ "event": "Disarm" }] }))
                .expect("valid log");
        assert_eq!(env.into_rows().map(|r| r.len()), Some(1));
    }
}
