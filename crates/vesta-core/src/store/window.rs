// ── Bounded event windows ──
//
// The panel only returns its most recent N log rows, so each poll sees
// a sliding, overlapping slice of history. Merging keeps established
// entries in place and slots unseen ones in next to their neighbours.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::model::{DeviceId, EventRecord, EventScope};

/// Merge a newest-first `batch` into a newest-first `window`.
///
/// Unseen entries before the first known entry in the batch are newer
/// than everything known and go to the head. Unseen entries after a
/// known entry go directly after it. Entries already in the window
/// never move relative to each other. The result is truncated to
/// `capacity`, evicting the oldest.
pub fn merge(window: &[EventRecord], batch: &[EventRecord], capacity: usize) -> Vec<EventRecord> {
    let position: HashMap<_, usize> = window
        .iter()
        .enumerate()
        .map(|(i, e)| (e.identity(), i))
        .collect();

    let mut seen = HashSet::new();
    let mut head = Vec::new();
    let mut after: HashMap<usize, Vec<&EventRecord>> = HashMap::new();
    let mut anchor = None;

    for event in batch {
        let id = event.identity();
        if let Some(&pos) = position.get(&id) {
            anchor = Some(pos);
            continue;
        }
        if !seen.insert(id) {
            continue;
        }
        match anchor {
            None => head.push(event),
            Some(pos) => after.entry(pos).or_default().push(event),
        }
    }

    let mut merged = Vec::with_capacity((window.len() + seen.len()).min(capacity));
    merged.extend(head.into_iter().cloned());
    for (i, event) in window.iter().enumerate() {
        merged.push(event.clone());
        if let Some(inserted) = after.remove(&i) {
            merged.extend(inserted.into_iter().cloned());
        }
    }
    merged.truncate(capacity);
    merged
}

/// Panel-wide and per-device windows after one merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventWindows {
    pub panel: Vec<EventRecord>,
    pub devices: BTreeMap<DeviceId, Vec<EventRecord>>,
}

/// Split a mixed batch by scope and merge each part into its window.
/// Windows with no entries in the batch are carried unchanged.
pub fn merge_batch(
    panel: &[EventRecord],
    devices: &BTreeMap<DeviceId, Vec<EventRecord>>,
    batch: Vec<EventRecord>,
    capacity: usize,
) -> EventWindows {
    let mut panel_batch = Vec::new();
    let mut device_batches: BTreeMap<DeviceId, Vec<EventRecord>> = BTreeMap::new();
    for event in batch {
        match &event.scope {
            EventScope::PanelWide => panel_batch.push(event),
            EventScope::Device(id) => device_batches.entry(id.clone()).or_default().push(event),
        }
    }

    let mut merged_devices = devices.clone();
    for (id, batch) in device_batches {
        let prior = devices.get(&id).map_or(&[][..], Vec::as_slice);
        let window = merge(prior, &batch, capacity);
        if window.is_empty() {
            merged_devices.remove(&id);
        } else {
            merged_devices.insert(id, window);
        }
    }

    EventWindows {
        panel: merge(panel, &panel_batch, capacity),
        devices: merged_devices,
    }
}
