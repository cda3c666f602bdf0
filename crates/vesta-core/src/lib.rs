// vesta-core: Panel state synchronization between vesta-api and consumers (CLI, hosts).

pub mod clock;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod parse;
pub mod retry;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use clock::{Clock, FixedClock, SystemClock};
pub use command::{CommandDispatcher, InFlight};
pub use config::{PanelConfig, PollSettings};
pub use coordinator::{ConnectionState, Coordinator, PollerState, SourceReport, TickOutcome};
pub use error::{CommandError, CoreError, FetchError, ParseError};
pub use retry::RetryPolicy;
pub use stream::ChangeStream;
pub use vesta_api::PanelClient;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ArmMode, ArmModeChange, ChangeSet, DeviceDelta, DeviceFieldChange, DeviceId, DeviceKind,
    DeviceRecord, EventRecord, EventScope, Freshness, PanelHealthChange, PanelSnapshot,
    SequenceKey, Source, SourceFreshness, SystemSnapshot,
};
