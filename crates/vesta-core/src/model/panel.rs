// ── Panel status domain types ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Panel security state.
///
/// Unrecognized firmware values land in `Unknown` with the raw text kept
/// for diagnostics; they never fail a poll.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArmMode {
    Disarmed,
    ArmedAway,
    ArmedHome,
    ArmedNight,
    Unknown(String),
}

impl ArmMode {
    /// Map the panel's `mode_a1` text (case-insensitive).
    pub fn from_panel(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "disarm" | "disarmed" => Self::Disarmed,
            "arm" | "armed" | "away" => Self::ArmedAway,
            "home" | "stay" => Self::ArmedHome,
            "night" => Self::ArmedNight,
            _ => Self::Unknown(raw.to_owned()),
        }
    }

    /// Numeric mode sent to `panelCondPost`. `None` for `Unknown`.
    pub fn command_code(&self) -> Option<u8> {
        match self {
            Self::Disarmed => Some(0),
            Self::ArmedAway => Some(1),
            Self::ArmedHome => Some(2),
            Self::ArmedNight => Some(3),
            Self::Unknown(_) => None,
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, Self::ArmedAway | Self::ArmedHome | Self::ArmedNight)
    }
}

impl fmt::Display for ArmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disarmed => f.write_str("disarmed"),
            Self::ArmedAway => f.write_str("armed_away"),
            Self::ArmedHome => f.write_str("armed_home"),
            Self::ArmedNight => f.write_str("armed_night"),
            Self::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}

/// Panel-level state from one successful status poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSnapshot {
    pub arm_mode: ArmMode,
    pub battery_ok: bool,
    /// Raw backup battery text ("Normal", "Low", "Charging", ...).
    pub battery_status: Option<String>,
    pub ac_ok: bool,
    /// GSM signal strength, clamped to 0..=100.
    pub gsm_signal_percent: Option<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl PanelSnapshot {
    /// Placeholder used before the first successful poll.
    pub fn unknown(at: DateTime<Utc>) -> Self {
        Self {
            arm_mode: ArmMode::Unknown(String::new()),
            battery_ok: true,
            battery_status: None,
            ac_ok: true,
            gsm_signal_percent: None,
            fetched_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panel_modes_map_case_insensitively() {
        assert_eq!(ArmMode::from_panel("Disarm"), ArmMode::Disarmed);
        assert_eq!(ArmMode::from_panel("arm"), ArmMode::ArmedAway);
        assert_eq!(ArmMode::from_panel("HOME"), ArmMode::ArmedHome);
        assert_eq!(ArmMode::from_panel("Night"), ArmMode::ArmedNight);
    }

    #[test]
    fn unknown_mode_keeps_raw_text() {
        assert_eq!(
            ArmMode::from_panel("Vacation"),
            ArmMode::Unknown("Vacation".into())
        );
        assert_eq!(ArmMode::Unknown("x".into()).command_code(), None);
    }

    #[test]
    fn command_codes_match_panel_firmware() {
        assert_eq!(ArmMode::Disarmed.command_code(), Some(0));
        assert_eq!(ArmMode::ArmedAway.command_code(), Some(1));
        assert_eq!(ArmMode::ArmedHome.command_code(), Some(2));
        assert_eq!(ArmMode::ArmedNight.command_code(), Some(3));
    }
}
