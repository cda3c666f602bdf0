// ── Event log domain types ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device::DeviceId;

/// Panel-assigned event identity within a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SequenceKey {
    Numeric(u64),
    Text(String),
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Which rolling window an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventScope {
    PanelWide,
    Device(DeviceId),
}

/// One immutable event log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence_key: SequenceKey,
    pub scope: EventScope,
    pub description: String,
    /// `None` when the panel's time text could not be parsed.
    pub occurred_at: Option<DateTime<Utc>>,
    pub raw_time: String,
    pub zone: Option<String>,
    pub area: Option<String>,
    pub user: Option<String>,
}

impl EventRecord {
    /// Dedup identity: `(scope, sequence_key)`.
    pub fn identity(&self) -> (&EventScope, &SequenceKey) {
        (&self.scope, &self.sequence_key)
    }
}
