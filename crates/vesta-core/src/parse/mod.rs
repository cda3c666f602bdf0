// ── Payload parsers ──
//
// Pure functions from raw response bytes to domain records. Structure
// violations are errors; unrecognized values are not.

mod events;
mod inventory;
mod status;

pub use events::{LogEntry, ScopeIndex, ZoneIndex, parse_event_log};
pub use inventory::{parse_inventory, status_is_triggered};
pub use status::parse_status;
