// ── Domain model ──
//
// Canonical types consumers see. Everything here is immutable once built
// and cheap to share behind `Arc`.

pub mod change;
pub mod device;
pub mod event;
pub mod panel;
pub mod snapshot;

pub use change::{ArmModeChange, ChangeSet, DeviceDelta, DeviceFieldChange, PanelHealthChange};
pub use device::{DeviceId, DeviceKind, DeviceRecord};
pub use event::{EventRecord, EventScope, SequenceKey};
pub use panel::{ArmMode, PanelSnapshot};
pub use snapshot::{Freshness, Source, SourceFreshness, SystemSnapshot};
