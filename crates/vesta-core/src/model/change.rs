// ── Change notifications ──
//
// One `ChangeSet` is emitted per published tick that changed anything.
// It carries only deltas; consumers needing the full picture pull the
// snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::device::{DeviceId, DeviceKind, DeviceRecord};
use super::event::EventRecord;
use super::panel::ArmMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmModeChange {
    pub from: ArmMode,
    pub to: ArmMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PanelHealthChange {
    BatteryOk { from: bool, to: bool },
    AcOk { from: bool, to: bool },
    GsmSignal { from: Option<u8>, to: Option<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceFieldChange {
    Triggered { from: bool, to: bool },
    BatteryLow { from: bool, to: bool },
    TamperOk { from: bool, to: bool },
    Kind { from: DeviceKind, to: DeviceKind },
    Name { from: String, to: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceDelta {
    Added(DeviceRecord),
    /// Unenrolled: absent from a successfully fetched inventory.
    Removed(DeviceRecord),
    Changed {
        id: DeviceId,
        changes: Vec<DeviceFieldChange>,
    },
}

impl DeviceDelta {
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::Added(record) | Self::Removed(record) => &record.id,
            Self::Changed { id, .. } => id,
        }
    }
}

/// Deltas between two consecutive published snapshots.
///
/// Field order is emission order: device deltas come before event
/// deltas so "device triggered" is seen before the event describing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub generation: u64,
    pub arm_mode: Option<ArmModeChange>,
    pub panel_health: Vec<PanelHealthChange>,
    pub device_deltas: Vec<DeviceDelta>,
    pub new_panel_events: Vec<EventRecord>,
    pub new_device_events: BTreeMap<DeviceId, Vec<EventRecord>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.arm_mode.is_none()
            && self.panel_health.is_empty()
            && self.device_deltas.is_empty()
            && self.new_panel_events.is_empty()
            && self.new_device_events.is_empty()
    }
}
