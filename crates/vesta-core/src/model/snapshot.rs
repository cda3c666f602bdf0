// ── Reconciled system snapshot ──

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device::{DeviceId, DeviceRecord};
use super::event::EventRecord;
use super::panel::PanelSnapshot;

/// The three independently fetched data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Status,
    Inventory,
    Events,
}

impl Source {
    pub const ALL: [Self; 3] = [Self::Status, Self::Inventory, Self::Events];
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status => f.write_str("status"),
            Self::Inventory => f.write_str("inventory"),
            Self::Events => f.write_str("events"),
        }
    }
}

/// Whether a carried sub-state came from the latest tick.
///
/// `Fresh` with an empty collection means "confirmed empty"; `Stale`
/// means the data is from an earlier tick because this source failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Freshness {
    /// Never fetched successfully.
    Pending,
    Fresh,
    Stale {
        since: DateTime<Utc>,
        reason: String,
    },
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }

    /// Mark as stale, keeping the start of an existing stale streak.
    pub(crate) fn degrade(&self, at: DateTime<Utc>, reason: String) -> Self {
        match self {
            Self::Stale { since, .. } => Self::Stale {
                since: *since,
                reason,
            },
            Self::Pending | Self::Fresh => Self::Stale { since: at, reason },
        }
    }
}

/// Per-source freshness of the carried sub-states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFreshness {
    pub inventory: Freshness,
    pub events: Freshness,
}

/// Full reconciled view of the panel at one point in time.
///
/// Published by atomic replacement; never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Bumped on every publish. `0` means nothing was ever published.
    pub generation: u64,
    pub panel: PanelSnapshot,
    pub devices: BTreeMap<DeviceId, DeviceRecord>,
    /// Panel-wide events, newest first, bounded.
    pub panel_events: Vec<EventRecord>,
    /// Per-device events, newest first, bounded per device.
    pub device_events: BTreeMap<DeviceId, Vec<EventRecord>>,
    pub freshness: SourceFreshness,
}

impl SystemSnapshot {
    /// The snapshot consumers see before the first successful tick.
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            generation: 0,
            panel: PanelSnapshot::unknown(at),
            devices: BTreeMap::new(),
            panel_events: Vec::new(),
            device_events: BTreeMap::new(),
            freshness: SourceFreshness {
                inventory: Freshness::Pending,
                events: Freshness::Pending,
            },
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.generation > 0
    }

    pub fn device(&self, id: &str) -> Option<&DeviceRecord> {
        self.devices.get(id)
    }

    pub fn events_for(&self, id: &str) -> &[EventRecord] {
        self.device_events.get(id).map_or(&[], Vec::as_slice)
    }

    /// Devices currently reporting a triggered state.
    pub fn triggered_devices(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values().filter(|d| d.triggered)
    }
}
