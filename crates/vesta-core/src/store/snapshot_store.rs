// ── Published snapshot ──
//
// Readers load the current `Arc<SystemSnapshot>` wait-free. The
// coordinator is the only writer and publishes whole snapshots; nothing
// inside a published snapshot is ever mutated.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{broadcast, watch};

use super::diff::diff;
use crate::model::{ChangeSet, SystemSnapshot};

const CHANGE_CHANNEL_SIZE: usize = 256;

pub struct SnapshotStore {
    current: ArcSwap<SystemSnapshot>,
    snapshots: watch::Sender<Arc<SystemSnapshot>>,
    changes: broadcast::Sender<Arc<ChangeSet>>,
}

impl SnapshotStore {
    pub fn new(initial: SystemSnapshot) -> Self {
        let initial = Arc::new(initial);
        let (snapshots, _) = watch::channel(Arc::clone(&initial));
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);
        Self {
            current: ArcSwap::new(initial),
            snapshots,
            changes,
        }
    }

    pub fn current(&self) -> Arc<SystemSnapshot> {
        self.current.load_full()
    }

    /// Replace the current snapshot and notify subscribers.
    ///
    /// The change set is broadcast only when something changed; it is
    /// returned either way so the caller can log it.
    pub fn publish(&self, next: SystemSnapshot) -> (Arc<SystemSnapshot>, ChangeSet) {
        let prev = self.current.load();
        let changes = diff(&prev, &next);
        let next = Arc::new(next);

        self.current.store(Arc::clone(&next));
        self.snapshots.send_replace(Arc::clone(&next));
        if !changes.is_empty() {
            // No receivers is fine.
            let _ = self.changes.send(Arc::new(changes.clone()));
        }
        (next, changes)
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<Arc<ChangeSet>> {
        self.changes.subscribe()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<Arc<SystemSnapshot>> {
        self.snapshots.subscribe()
    }
}
