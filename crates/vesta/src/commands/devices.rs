//! `vesta devices`: enrolled devices from the latest inventory poll.

use tabled::Tabled;

use vesta_core::DeviceRecord;

use crate::cli::{DevicesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::{Session, util};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Zone")]
    zone: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Battery")]
    battery: String,
    #[tabled(rename = "Tamper")]
    tamper: String,
}

impl From<&DeviceRecord> for DeviceRow {
    fn from(d: &DeviceRecord) -> Self {
        Self {
            id: d.id.to_string(),
            name: d.name.clone(),
            kind: d.kind.to_string(),
            zone: d.zone.map(|z| z.to_string()).unwrap_or_default(),
            status: d.raw_status.clone(),
            battery: if d.battery_low { "low" } else { "ok" }.into(),
            tamper: if d.tamper_ok { "ok" } else { "open" }.into(),
        }
    }
}

fn detail(d: &DeviceRecord) -> String {
    [
        format!("ID:        {}", d.id),
        format!("Name:      {}", if d.name.is_empty() { "-" } else { &d.name }),
        format!("Type:      {}", d.kind),
        format!(
            "Zone:      {}",
            d.zone.map_or_else(|| "-".into(), |z| z.to_string())
        ),
        format!(
            "Area:      {}",
            d.area.map_or_else(|| "-".into(), |a| a.to_string())
        ),
        format!("Status:    {} (triggered: {})", d.raw_status, d.triggered),
        format!("Battery:   {}", if d.battery_low { "low" } else { "ok" }),
        format!("Tamper:    {}", if d.tamper_ok { "ok" } else { "open" }),
        format!("RSSI:      {}", d.rssi.as_deref().unwrap_or("-")),
        format!("Last seen: {}", util::local_time(Some(d.last_seen), "")),
    ]
    .join("\n")
}

pub async fn handle(session: &Session, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let snap = util::poll_once(&session.coordinator, &session.profile).await?;
    if !snap.freshness.inventory.is_fresh() {
        tracing::warn!(freshness = ?snap.freshness.inventory, "device list is not fresh");
    }

    if let Some(id) = args.id {
        let device = snap.device(&id).ok_or_else(|| CliError::NotFound {
            resource_type: "device".into(),
            identifier: id.clone(),
            list_command: "devices".into(),
        })?;
        let out = output::render_single(global.output, device, detail, |d| d.id.to_string())?;
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    let devices: Vec<DeviceRecord> = snap
        .devices
        .values()
        .filter(|d| !args.triggered || d.triggered)
        .cloned()
        .collect();
    let out = output::render_list(global.output, &devices, |d| DeviceRow::from(d), |d| {
        d.id.to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
