//! `vesta arm <mode>`: issue a mode change and wait for the polled
//! status to confirm it.

use vesta_core::ArmMode;

use crate::cli::{ArmArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::Session;

pub async fn handle(session: &Session, args: &ArmArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let coordinator = &session.coordinator;
    let target = ArmMode::from(args.mode);
    let color = output::should_color(global.color);

    // Confirmation needs the poll loop running.
    coordinator.start().await;
    if !global.quiet {
        eprintln!(
            "Requesting {} (area {})...",
            output::arm_mode(&target, color),
            coordinator.settings().area
        );
    }

    let result = tokio::select! {
        biased;
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(CliError::from).and(Err(CliError::CommandAbandoned))
        }
        outcome = coordinator.set_arm_mode(target.clone()) => outcome.map_err(CliError::from),
    };
    coordinator.shutdown().await;
    result?;

    if !global.quiet {
        eprintln!("✓ Panel confirmed {}", output::arm_mode(&target, color));
    }
    Ok(())
}
