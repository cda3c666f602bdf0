//! `vesta status`: arm mode and panel health.

use serde::Serialize;

use vesta_core::{ArmMode, Freshness, SystemSnapshot};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::{Session, util};

#[derive(Serialize)]
struct StatusView<'a> {
    arm_mode: &'a ArmMode,
    battery_ok: bool,
    battery_status: Option<&'a str>,
    ac_ok: bool,
    gsm_signal_percent: Option<u8>,
    devices: usize,
    triggered: Vec<&'a str>,
    inventory: &'a Freshness,
    events: &'a Freshness,
    fetched_at: chrono::DateTime<chrono::Utc>,
}

impl<'a> StatusView<'a> {
    fn new(snap: &'a SystemSnapshot) -> Self {
        Self {
            arm_mode: &snap.panel.arm_mode,
            battery_ok: snap.panel.battery_ok,
            battery_status: snap.panel.battery_status.as_deref(),
            ac_ok: snap.panel.ac_ok,
            gsm_signal_percent: snap.panel.gsm_signal_percent,
            devices: snap.devices.len(),
            triggered: snap.triggered_devices().map(|d| d.id.as_str()).collect(),
            inventory: &snap.freshness.inventory,
            events: &snap.freshness.events,
            fetched_at: snap.panel.fetched_at,
        }
    }
}

fn freshness(f: &Freshness) -> String {
    match f {
        Freshness::Fresh => "fresh".into(),
        Freshness::Pending => "pending".into(),
        Freshness::Stale { since, reason } => format!("stale since {since} ({reason})"),
    }
}

fn detail(view: &StatusView<'_>, color: bool) -> String {
    let battery = output::health(
        view.battery_ok,
        view.battery_status.unwrap_or("ok"),
        view.battery_status.unwrap_or("low"),
        color,
    );
    let triggered = if view.triggered.is_empty() {
        "-".to_owned()
    } else {
        view.triggered.join(", ")
    };
    [
        format!("Mode:       {}", output::arm_mode(view.arm_mode, color)),
        format!("Battery:    {battery}"),
        format!("AC power:   {}", output::health(view.ac_ok, "ok", "lost", color)),
        format!(
            "GSM signal: {}",
            view.gsm_signal_percent
                .map_or_else(|| "-".into(), |p| format!("{p}%"))
        ),
        format!("Devices:    {}", view.devices),
        format!("Triggered:  {triggered}"),
        format!("Inventory:  {}", freshness(view.inventory)),
        format!("Events:     {}", freshness(view.events)),
        format!("Fetched:    {}", util::local_time(Some(view.fetched_at), "")),
    ]
    .join("\n")
}

pub async fn handle(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let snap = util::poll_once(&session.coordinator, &session.profile).await?;
    let view = StatusView::new(&snap);
    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &view,
        |v| detail(v, color),
        |v| v.arm_mode.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
