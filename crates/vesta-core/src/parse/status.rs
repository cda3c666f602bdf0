use chrono::{DateTime, Utc};
use vesta_api::models::StatusEnvelope;

use crate::error::ParseError;
use crate::model::{ArmMode, PanelSnapshot, Source};

/// Parse a `panelCondGet` body.
pub fn parse_status(body: &[u8], fetched_at: DateTime<Utc>) -> Result<PanelSnapshot, ParseError> {
    let envelope: StatusEnvelope =
        serde_json::from_slice(body).map_err(|e| ParseError::from_json(Source::Status, &e))?;
    let raw = envelope.into_status();

    let mode = raw.mode.ok_or(ParseError::MissingField {
        payload: Source::Status,
        field: "mode_a1",
    })?;

    Ok(PanelSnapshot {
        arm_mode: ArmMode::from_panel(&mode),
        battery_ok: raw.battery.as_deref().is_none_or(battery_text_ok),
        battery_status: raw.battery,
        ac_ok: !raw.ac_fail.unwrap_or(false),
        gsm_signal_percent: raw
            .sig_gsm
            .and_then(|v| u8::try_from(v.clamp(0, 100)).ok()),
        fetched_at,
    })
}

fn battery_text_ok(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    !(lower.contains("low") || lower.contains("fail"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_wrapped_status() {
        let body = br#"{"updates":{"mode_a1":"Home","battery":"Normal","ac_fail":"0","sig_gsm":"64"}}"#;
        let panel = parse_status(body, at()).unwrap();
        assert_eq!(
            panel,
            PanelSnapshot {
                arm_mode: ArmMode::ArmedHome,
                battery_ok: true,
                battery_status: Some("Normal".into()),
                ac_ok: true,
                gsm_signal_percent: Some(64),
                fetched_at: at(),
            }
        );
    }

    #[test]
    fn low_or_failed_battery_text_is_not_ok() {
        for text in ["Low", "LOW BATTERY", "Battery Fail"] {
            let body = format!(r#"{{"mode_a1":"Disarm","battery":"{text}"}}"#);
            assert!(!parse_status(body.as_bytes(), at()).unwrap().battery_ok, "{text}");
        }
        let body = br#"{"mode_a1":"Disarm","battery":"Charging"}"#;
        assert!(parse_status(body, at()).unwrap().battery_ok);
    }

    #[test]
    fn ac_fail_flag_inverts_ac_ok() {
        let body = br#"{"mode_a1":"Arm","ac_fail":"1"}"#;
        assert!(!parse_status(body, at()).unwrap().ac_ok);
    }

    #[test]
    fn gsm_signal_is_clamped_and_optional() {
        let high = br#"{"mode_a1":"Arm","sig_gsm":140}"#;
        assert_eq!(parse_status(high, at()).unwrap().gsm_signal_percent, Some(100));
        let negative = br#"{"mode_a1":"Arm","sig_gsm":"-3"}"#;
        assert_eq!(parse_status(negative, at()).unwrap().gsm_signal_percent, Some(0));
        let garbage = br#"{"mode_a1":"Arm","sig_gsm":"n/a"}"#;
        assert_eq!(parse_status(garbage, at()).unwrap().gsm_signal_percent, None);
    }

    #[test]
    fn unknown_mode_is_not_an_error() {
        let body = br#"{"mode_a1":"Holiday"}"#;
        assert_eq!(
            parse_status(body, at()).unwrap().arm_mode,
            ArmMode::Unknown("Holiday".into())
        );
    }

    #[test]
    fn missing_mode_is_an_error() {
        let err = parse_status(br#"{"battery":"Normal"}"#, at()).unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingField {
                payload: Source::Status,
                field: "mode_a1"
            }
        );
    }

    #[test]
    fn non_json_is_an_error() {
        let err = parse_status(b"<html>login</html>", at()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson { .. }));
    }
}
