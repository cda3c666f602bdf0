use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::warn;
use vesta_api::models::{EventLogEnvelope, RawLogEntry};

use crate::error::ParseError;
use crate::model::{DeviceId, DeviceRecord, EventRecord, EventScope, SequenceKey, Source};

const NAIVE_TIME_FORMATS: &[&str] = &["%Y/%m/%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M:%S"];

/// One event log row before scope resolution.
///
/// Scope depends on the device inventory, which is fetched concurrently,
/// so it is attached later by [`LogEntry::into_record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub sequence_key: SequenceKey,
    pub description: String,
    pub raw_time: String,
    pub occurred_at: Option<DateTime<Utc>>,
    pub zone: Option<String>,
    pub area: Option<String>,
    pub user: Option<String>,
}

impl LogEntry {
    pub fn into_record(self, zones: &ZoneIndex) -> EventRecord {
        let scope = zones.resolve(self.zone.as_deref());
        self.with_scope(scope)
    }

    pub fn with_scope(self, scope: EventScope) -> EventRecord {
        EventRecord {
            scope,
            sequence_key: self.sequence_key,
            description: self.description,
            occurred_at: self.occurred_at,
            raw_time: self.raw_time,
            zone: self.zone,
            area: self.area,
            user: self.user,
        }
    }
}

/// Zone number to device lookup for one inventory.
#[derive(Debug, Clone, Default)]
pub struct ZoneIndex {
    by_zone: HashMap<u32, DeviceId>,
}

impl ZoneIndex {
    pub fn new(devices: &BTreeMap<DeviceId, DeviceRecord>) -> Self {
        let mut by_zone = HashMap::new();
        for device in devices.values() {
            if let Some(zone) = device.zone {
                by_zone.entry(zone).or_insert_with(|| device.id.clone());
            }
        }
        Self { by_zone }
    }

    pub fn resolve(&self, zone: Option<&str>) -> EventScope {
        zone.and_then(|z| z.trim().parse::<u32>().ok())
            .and_then(|z| self.by_zone.get(&z))
            .map_or(EventScope::PanelWide, |id| EventScope::Device(id.clone()))
    }
}

/// Scope each log row was given when first seen, by sequence key.
///
/// A row keeps that scope for as long as the panel keeps returning it,
/// so a later inventory change never turns an old row into a new event
/// in a different window.
#[derive(Debug, Clone, Default)]
pub struct ScopeIndex {
    by_key: HashMap<SequenceKey, EventScope>,
}

impl ScopeIndex {
    /// Attach scopes to one fetched batch. Rows missing from the batch
    /// have left the panel's log and are forgotten.
    pub fn assign(&mut self, entries: Vec<LogEntry>, zones: &ZoneIndex) -> Vec<EventRecord> {
        let mut seen: HashMap<SequenceKey, EventScope> = HashMap::with_capacity(entries.len());
        let records = entries
            .into_iter()
            .map(|entry| {
                let scope = seen
                    .entry(entry.sequence_key.clone())
                    .or_insert_with(|| {
                        self.by_key
                            .get(&entry.sequence_key)
                            .cloned()
                            .unwrap_or_else(|| zones.resolve(entry.zone.as_deref()))
                    })
                    .clone();
                entry.with_scope(scope)
            })
            .collect();
        self.by_key = seen;
        records
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Parse a `logsGet` body. Rows stay in panel order (newest first).
pub fn parse_event_log(body: &[u8]) -> Result<Vec<LogEntry>, ParseError> {
    let envelope: EventLogEnvelope =
        serde_json::from_slice(body).map_err(|e| ParseError::from_json(Source::Events, &e))?;
    let rows = envelope.into_rows().ok_or(ParseError::MissingField {
        payload: Source::Events,
        field: "logrows",
    })?;

    let mut entries = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<RawLogEntry>(row) {
            Ok(raw) => entries.push(into_entry(raw)),
            Err(e) => warn!(index, error = %e, "skipping undecodable event row"),
        }
    }
    Ok(entries)
}

fn into_entry(raw: RawLogEntry) -> LogEntry {
    let sequence_key = [raw.uid.as_ref(), raw.id.as_ref()]
        .into_iter()
        .flatten()
        .find_map(key_from_value)
        .unwrap_or_else(|| derived_key(&raw));
    let raw_time = raw.time.unwrap_or_default();
    LogEntry {
        sequence_key,
        description: raw.event.unwrap_or_default(),
        occurred_at: parse_panel_time(&raw_time),
        raw_time,
        zone: raw.zone,
        area: raw.area,
        user: raw.user,
    }
}

fn key_from_value(value: &Value) -> Option<SequenceKey> {
    match value {
        Value::Number(n) => Some(
            n.as_u64()
                .map_or_else(|| SequenceKey::Text(n.to_string()), SequenceKey::Numeric),
        ),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            Some(
                s.parse::<u64>()
                    .map_or_else(|_| SequenceKey::Text(s.to_owned()), SequenceKey::Numeric),
            )
        }
        _ => None,
    }
}

fn derived_key(raw: &RawLogEntry) -> SequenceKey {
    let parts = [&raw.time, &raw.event, &raw.zone, &raw.area, &raw.user]
        .map(|field| field.as_deref().unwrap_or_default());
    SequenceKey::Text(parts.join("|"))
}

/// Panel time text, RFC 3339 or one of the naive formats (read as UTC).
pub(crate) fn parse_panel_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    NAIVE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}
