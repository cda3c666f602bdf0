// ── Snapshot state ──
//
// Bounded event windows, snapshot diffing, and the published snapshot
// itself.

mod diff;
mod snapshot_store;
mod window;

pub use diff::diff;
pub use snapshot_store::SnapshotStore;
pub use window::{EventWindows, merge, merge_batch};
