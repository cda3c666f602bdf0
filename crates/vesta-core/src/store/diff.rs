use std::collections::{BTreeMap, HashSet};

use crate::model::{
    ArmModeChange, ChangeSet, DeviceDelta, DeviceFieldChange, DeviceRecord, EventRecord,
    PanelHealthChange, SystemSnapshot,
};

/// Compute what changed between two consecutive snapshots.
pub fn diff(prev: &SystemSnapshot, next: &SystemSnapshot) -> ChangeSet {
    let mut changes = ChangeSet {
        generation: next.generation,
        ..ChangeSet::default()
    };

    if prev.panel.arm_mode != next.panel.arm_mode {
        changes.arm_mode = Some(ArmModeChange {
            from: prev.panel.arm_mode.clone(),
            to: next.panel.arm_mode.clone(),
        });
    }

    if prev.panel.battery_ok != next.panel.battery_ok {
        changes.panel_health.push(PanelHealthChange::BatteryOk {
            from: prev.panel.battery_ok,
            to: next.panel.battery_ok,
        });
    }
    if prev.panel.ac_ok != next.panel.ac_ok {
        changes.panel_health.push(PanelHealthChange::AcOk {
            from: prev.panel.ac_ok,
            to: next.panel.ac_ok,
        });
    }
    if prev.panel.gsm_signal_percent != next.panel.gsm_signal_percent {
        changes.panel_health.push(PanelHealthChange::GsmSignal {
            from: prev.panel.gsm_signal_percent,
            to: next.panel.gsm_signal_percent,
        });
    }

    for (id, before) in &prev.devices {
        if !next.devices.contains_key(id) {
            changes.device_deltas.push(DeviceDelta::Removed(before.clone()));
        }
    }
    for (id, after) in &next.devices {
        match prev.devices.get(id) {
            None => changes.device_deltas.push(DeviceDelta::Added(after.clone())),
            Some(before) => {
                let fields = device_changes(before, after);
                if !fields.is_empty() {
                    changes.device_deltas.push(DeviceDelta::Changed {
                        id: id.clone(),
                        changes: fields,
                    });
                }
            }
        }
    }

    changes.new_panel_events = unseen(&prev.panel_events, &next.panel_events);
    let empty = Vec::new();
    let mut new_device_events = BTreeMap::new();
    for (id, window) in &next.device_events {
        let fresh = unseen(prev.device_events.get(id).unwrap_or(&empty), window);
        if !fresh.is_empty() {
            new_device_events.insert(id.clone(), fresh);
        }
    }
    changes.new_device_events = new_device_events;

    changes
}

fn device_changes(before: &DeviceRecord, after: &DeviceRecord) -> Vec<DeviceFieldChange> {
    let mut fields = Vec::new();
    if before.triggered != after.triggered {
        fields.push(DeviceFieldChange::Triggered {
            from: before.triggered,
            to: after.triggered,
        });
    }
    if before.battery_low != after.battery_low {
        fields.push(DeviceFieldChange::BatteryLow {
            from: before.battery_low,
            to: after.battery_low,
        });
    }
    if before.tamper_ok != after.tamper_ok {
        fields.push(DeviceFieldChange::TamperOk {
            from: before.tamper_ok,
            to: after.tamper_ok,
        });
    }
    if before.kind != after.kind {
        fields.push(DeviceFieldChange::Kind {
            from: before.kind.clone(),
            to: after.kind.clone(),
        });
    }
    if before.name != after.name {
        fields.push(DeviceFieldChange::Name {
            from: before.name.clone(),
            to: after.name.clone(),
        });
    }
    fields
}

/// Entries of `next` not present in `prev`, newest first.
fn unseen(prev: &[EventRecord], next: &[EventRecord]) -> Vec<EventRecord> {
    let known: HashSet<_> = prev.iter().map(EventRecord::identity).collect();
    next.iter()
        .filter(|e| !known.contains(&e.identity()))
        .cloned()
        .collect()
}
