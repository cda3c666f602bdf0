//! `vesta events`: the recent event log, panel-wide and per device.

use tabled::Tabled;

use vesta_core::{EventRecord, EventScope};

use crate::cli::{EventsArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::{Session, util};

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Event")]
    description: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Zone")]
    zone: String,
    #[tabled(rename = "User")]
    user: String,
}

impl From<&EventRecord> for EventRow {
    fn from(e: &EventRecord) -> Self {
        Self {
            time: util::local_time(e.occurred_at, &e.raw_time),
            description: e.description.clone(),
            device: match &e.scope {
                EventScope::PanelWide => "-".into(),
                EventScope::Device(id) => id.to_string(),
            },
            zone: e.zone.clone().unwrap_or_default(),
            user: e.user.clone().unwrap_or_default(),
        }
    }
}

pub async fn handle(session: &Session, args: EventsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let snap = util::poll_once(&session.coordinator, &session.profile).await?;

    let mut events: Vec<EventRecord> = match &args.device {
        Some(id) => {
            if snap.device(id).is_none() {
                return Err(CliError::NotFound {
                    resource_type: "device".into(),
                    identifier: id.clone(),
                    list_command: "devices".into(),
                });
            }
            snap.events_for(id).to_vec()
        }
        None => snap
            .panel_events
            .iter()
            .chain(snap.device_events.values().flatten())
            .cloned()
            .collect(),
    };
    // Windows are newest first; interleave them by time, unparseable last.
    events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    if let Some(limit) = args.limit {
        events.truncate(limit);
    }

    let out = output::render_list(global.output, &events, |e| EventRow::from(e), |e| {
        e.sequence_key.to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
