//! `vesta watch`: run the poll loop and print every change set.

use futures_util::StreamExt;
use owo_colors::OwoColorize;

use vesta_core::{
    ChangeSet, ConnectionState, DeviceDelta, DeviceFieldChange, EventRecord, PanelHealthChange,
};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::{Session, util};

pub async fn handle(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let coordinator = &session.coordinator;
    let color = output::should_color(global.color);
    let mut changes = coordinator.subscribe();
    let mut connection = coordinator.connection_state();

    coordinator.start().await;
    if !global.quiet {
        eprintln!("Watching panel (Ctrl-C to stop)");
    }

    let result = loop {
        tokio::select! {
            biased;
            signal = tokio::signal::ctrl_c() => break signal.map_err(CliError::from),
            changed = connection.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = connection.borrow_and_update().clone();
                if state == ConnectionState::AuthRequired {
                    break Err(CliError::AuthFailed { profile: session.profile.clone() });
                }
                if !global.quiet {
                    eprintln!("connection: {}", connection_label(&state, color));
                }
            }
            next = changes.next() => {
                let Some(set) = next else { break Ok(()) };
                let out = render_change_set(&set, global.output, color)?;
                output::print_output(&out, global.quiet);
            }
        }
    };

    coordinator.shutdown().await;
    result
}

fn connection_label(state: &ConnectionState, color: bool) -> String {
    let text = match state {
        ConnectionState::Connecting => "connecting".to_owned(),
        ConnectionState::Online => "online".to_owned(),
        ConnectionState::Degraded {
            consecutive_failures,
        } => format!("degraded ({consecutive_failures} failed polls)"),
        ConnectionState::Offline {
            consecutive_failures,
        } => format!("offline ({consecutive_failures} failed polls)"),
        ConnectionState::AuthRequired => "authentication required".to_owned(),
    };
    if !color {
        return text;
    }
    match state {
        ConnectionState::Online => text.green().to_string(),
        ConnectionState::Connecting | ConnectionState::Degraded { .. } => {
            text.yellow().to_string()
        }
        ConnectionState::Offline { .. } | ConnectionState::AuthRequired => {
            text.red().to_string()
        }
    }
}

/// One change set as a JSON line, a YAML document or human-readable lines.
fn render_change_set(
    set: &ChangeSet,
    format: OutputFormat,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(set, true),
        OutputFormat::Yaml => {
            let doc = output::render_yaml(set)?;
            Ok(format!("---\n{}", doc.trim_end()))
        }
        OutputFormat::Table | OutputFormat::Plain => Ok(change_lines(set, color).join("\n")),
    }
}

fn change_lines(set: &ChangeSet, color: bool) -> Vec<String> {
    let prefix = format!("[{}]", set.generation);
    let mut lines = Vec::new();

    if let Some(change) = &set.arm_mode {
        lines.push(format!(
            "{prefix} mode {} -> {}",
            output::arm_mode(&change.from, color),
            output::arm_mode(&change.to, color)
        ));
    }
    for health in &set.panel_health {
        lines.push(format!("{prefix} {}", health_line(health, color)));
    }
    for delta in &set.device_deltas {
        lines.push(format!("{prefix} {}", delta_line(delta)));
    }
    for event in &set.new_panel_events {
        lines.push(format!("{prefix} {}", event_line(event)));
    }
    for (id, events) in &set.new_device_events {
        for event in events {
            lines.push(format!("{prefix} {id}: {}", event_line(event)));
        }
    }
    lines
}

fn health_line(change: &PanelHealthChange, color: bool) -> String {
    match change {
        PanelHealthChange::BatteryOk { to, .. } => {
            format!("battery {}", output::health(*to, "ok", "low", color))
        }
        PanelHealthChange::AcOk { to, .. } => {
            format!("AC power {}", output::health(*to, "restored", "lost", color))
        }
        PanelHealthChange::GsmSignal { from, to } => {
            let pct = |p: Option<u8>| p.map_or_else(|| "-".into(), |v| format!("{v}%"));
            format!("GSM signal {} -> {}", pct(*from), pct(*to))
        }
    }
}

fn delta_line(delta: &DeviceDelta) -> String {
    match delta {
        DeviceDelta::Added(d) => format!("device {} enrolled ({}, {})", d.id, d.kind, d.name),
        DeviceDelta::Removed(d) => format!("device {} removed ({})", d.id, d.name),
        DeviceDelta::Changed { id, changes } => {
            let fields: Vec<String> = changes.iter().map(field_change).collect();
            format!("device {id} {}", fields.join(", "))
        }
    }
}

fn field_change(change: &DeviceFieldChange) -> String {
    match change {
        DeviceFieldChange::Triggered { to, .. } => {
            if *to { "triggered" } else { "cleared" }.to_owned()
        }
        DeviceFieldChange::BatteryLow { to, .. } => {
            if *to { "battery low" } else { "battery ok" }.to_owned()
        }
        DeviceFieldChange::TamperOk { to, .. } => {
            if *to { "tamper restored" } else { "tampered" }.to_owned()
        }
        DeviceFieldChange::Kind { from, to } => format!("type {from} -> {to}"),
        DeviceFieldChange::Name { from, to } => format!("renamed {from:?} -> {to:?}"),
    }
}

fn event_line(event: &EventRecord) -> String {
    format!(
        "{} {}",
        util::local_time(event.occurred_at, &event.raw_time),
        event.description
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc};
    use vesta_core::{
        ArmMode, ArmModeChange, DeviceId, DeviceKind, DeviceRecord, EventScope, SequenceKey,
    };

    use super::*;

    fn door(id: &str) -> DeviceRecord {
        DeviceRecord {
            id: DeviceId::new(id),
            kind: DeviceKind::Door,
            name: "Front".into(),
            zone: Some(3),
            area: Some(1),
            triggered: true,
            battery_low: false,
            tamper_ok: true,
            rssi: None,
            raw_status: "Door Open".into(),
            last_seen: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn change_lines_follow_emission_order() {
        let event = EventRecord {
            sequence_key: SequenceKey::Numeric(9),
            scope: EventScope::Device(DeviceId::new("RF:1")),
            description: "Door open".into(),
            occurred_at: None,
            raw_time: "bad time".into(),
            zone: Some("3".into()),
            area: None,
            user: None,
        };
        let set = ChangeSet {
            generation: 4,
            arm_mode: Some(ArmModeChange {
                from: ArmMode::ArmedAway,
                to: ArmMode::Disarmed,
            }),
            panel_health: vec![],
            device_deltas: vec![DeviceDelta::Added(door("RF:1"))],
            new_panel_events: vec![],
            new_device_events: BTreeMap::from([(DeviceId::new("RF:1"), vec![event])]),
        };

        assert_eq!(
            change_lines(&set, false),
            vec![
                "[4] mode armed_away -> disarmed".to_owned(),
                "[4] device RF:1 enrolled (door, Front)".to_owned(),
                "[4] RF:1: bad time Door open".to_owned(),
            ]
        );
    }

    #[test]
    fn yaml_output_is_one_document_per_change_set() {
        let set = ChangeSet {
            generation: 7,
            arm_mode: Some(ArmModeChange {
                from: ArmMode::Disarmed,
                to: ArmMode::ArmedHome,
            }),
            panel_health: vec![],
            device_deltas: vec![],
            new_panel_events: vec![],
            new_device_events: BTreeMap::new(),
        };

        let yaml = render_change_set(&set, OutputFormat::Yaml, false).unwrap();
        assert!(yaml.starts_with("---\n"), "{yaml}");
        assert!(!yaml.trim_start_matches("---\n").starts_with('{'), "{yaml}");
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed["generation"], serde_yaml::Value::from(7));

        let json = render_change_set(&set, OutputFormat::Json, false).unwrap();
        assert!(!json.contains('\n'));
        assert_eq!(serde_json::from_str::<serde_json::Value>(&json).unwrap()["generation"], 7);
    }

    #[test]
    fn field_changes_read_naturally() {
        let delta = DeviceDelta::Changed {
            id: DeviceId::new("RF:2"),
            changes: vec![
                DeviceFieldChange::Triggered {
                    from: false,
                    to: true,
                },
                DeviceFieldChange::BatteryLow {
                    from: false,
                    to: true,
                },
            ],
        };
        assert_eq!(delta_line(&delta), "device RF:2 triggered, battery low");
    }
}
