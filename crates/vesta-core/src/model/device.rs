// ── Device domain types ──

use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable, panel-assigned device identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Sensor classification, normalized from the panel's `type_f` label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    Door,
    Motion,
    Smoke,
    Co,
    WaterLeak,
    GlassBreak,
    Unknown(String),
}

impl DeviceKind {
    pub fn from_panel(type_f: &str) -> Self {
        match type_f.trim() {
            "Door Contact" => Self::Door,
            "IR" | "PIR" => Self::Motion,
            "Smoke Detector" => Self::Smoke,
            "CO Detector" => Self::Co,
            "Water Sensor" => Self::WaterLeak,
            "Glass Break" => Self::GlassBreak,
            other => Self::Unknown(other.to_owned()),
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Door => f.write_str("door"),
            Self::Motion => f.write_str("motion"),
            Self::Smoke => f.write_str("smoke"),
            Self::Co => f.write_str("co"),
            Self::WaterLeak => f.write_str("water_leak"),
            Self::GlassBreak => f.write_str("glass_break"),
            Self::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}

/// One enrolled device as of the latest successful inventory poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub kind: DeviceKind,
    pub name: String,
    pub zone: Option<u32>,
    pub area: Option<u32>,
    pub triggered: bool,
    pub battery_low: bool,
    pub tamper_ok: bool,
    pub rssi: Option<String>,
    /// Status text exactly as the panel reported it.
    pub raw_status: String,
    pub last_seen: DateTime<Utc>,
}
