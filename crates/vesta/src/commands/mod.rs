//! Command dispatch: bridges CLI args -> coordinator -> output formatting.

pub mod arm;
pub mod config_cmd;
pub mod devices;
pub mod events;
pub mod status;
pub mod util;
pub mod watch;

use vesta_core::{Coordinator, PanelClient};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// A coordinator bound to the resolved profile.
pub struct Session {
    pub coordinator: Coordinator<PanelClient>,
    pub profile: String,
}

/// Dispatch a panel-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::handle(session, global).await,
        Command::Devices(args) => devices::handle(session, args, global).await,
        Command::Events(args) => events::handle(session, args, global).await,
        Command::Watch(_) => watch::handle(session, global).await,
        Command::Arm(args) => arm::handle(session, &args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "does not talk to a panel".into(),
        }),
    }
}
