use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::warn;
use vesta_api::models::{DeviceListEnvelope, RawDevice};

use crate::error::ParseError;
use crate::model::{DeviceId, DeviceKind, DeviceRecord, Source};

const TRIGGERED_ON: &[&str] = &[
    "door open",
    "open",
    "triggered",
    "motion",
    "alarm",
    "active",
    "tamper",
    "low battery",
];

const TRIGGERED_OFF: &[&str] = &[
    "door close",
    "close",
    "closed",
    "normal",
    "ready",
    "standby",
    "ok",
];

/// Parse a `deviceListGet` body into the full device set.
///
/// A row that fails to decode is skipped with a warning; the rest of the
/// inventory still counts as a successful fetch.
pub fn parse_inventory(
    body: &[u8],
    fetched_at: DateTime<Utc>,
) -> Result<BTreeMap<DeviceId, DeviceRecord>, ParseError> {
    let envelope: DeviceListEnvelope =
        serde_json::from_slice(body).map_err(|e| ParseError::from_json(Source::Inventory, &e))?;
    let rows = envelope.senrows.ok_or(ParseError::MissingField {
        payload: Source::Inventory,
        field: "senrows",
    })?;

    let mut devices = BTreeMap::new();
    for (index, row) in rows.into_iter().enumerate() {
        let raw: RawDevice = match serde_json::from_value(row) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(index, error = %e, "skipping undecodable device row");
                continue;
            }
        };
        let record = into_record(raw, fetched_at);
        if devices.contains_key(&record.id) {
            warn!(device_id = %record.id, "duplicate device id in inventory, keeping first");
            continue;
        }
        devices.insert(record.id.clone(), record);
    }
    Ok(devices)
}

fn into_record(raw: RawDevice, fetched_at: DateTime<Utc>) -> DeviceRecord {
    let raw_status = raw.status.unwrap_or_default();
    let kind = raw
        .type_f
        .as_deref()
        .map_or_else(|| DeviceKind::Unknown(String::new()), DeviceKind::from_panel);
    DeviceRecord {
        name: raw.name.unwrap_or_else(|| raw.id.clone()),
        id: DeviceId::new(raw.id),
        kind,
        zone: raw.zone.and_then(|z| u32::try_from(z).ok()),
        area: raw.area.and_then(|a| u32::try_from(a).ok()),
        triggered: status_is_triggered(&raw_status),
        battery_low: !raw.battery_ok.unwrap_or(true),
        tamper_ok: raw.tamper_ok.unwrap_or(true),
        rssi: raw.rssi,
        raw_status,
        last_seen: fetched_at,
    }
}

/// Classify a device status label. Unrecognized text is not triggered.
pub fn status_is_triggered(status: &str) -> bool {
    let lower = status.trim().to_ascii_lowercase();
    if TRIGGERED_ON.contains(&lower.as_str()) {
        return true;
    }
    if TRIGGERED_OFF.contains(&lower.as_str()) {
        return false;
    }
    if ["open", "motion", "alarm"].iter().any(|w| lower.contains(w)) {
        return true;
    }
    // close/normal/ready substrings and everything else
    false
}
