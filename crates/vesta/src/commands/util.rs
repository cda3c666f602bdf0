//! Shared helpers for command handlers.

use std::sync::Arc;

use vesta_core::{
    Coordinator, CoreError, FetchError, PanelClient, SourceReport, SystemSnapshot, TickOutcome,
};

use crate::error::CliError;

/// Run one tick and return the published snapshot.
///
/// One-shot commands poll exactly once; a tick that publishes nothing is
/// reported through the first source error it carried.
pub async fn poll_once(
    coordinator: &Coordinator<PanelClient>,
    profile: &str,
) -> Result<Arc<SystemSnapshot>, CliError> {
    match coordinator.tick().await {
        TickOutcome::Published { .. } => Ok(coordinator.current_snapshot()),
        TickOutcome::AuthFailed { .. } => Err(CliError::AuthFailed {
            profile: profile.into(),
        }),
        TickOutcome::StatusUnavailable { reports } | TickOutcome::FullFailure { reports, .. } => {
            Err(first_failure(&reports))
        }
        other => Err(CliError::PanelUnavailable {
            reason: format!("poll did not run ({other:?})"),
        }),
    }
}

fn first_failure(reports: &[SourceReport]) -> CliError {
    reports
        .iter()
        .find_map(|r| r.error.clone())
        .map_or_else(
            || CliError::PanelUnavailable {
                reason: "no source answered".into(),
            },
            |err| match err {
                FetchError::DeadlineExceeded => CliError::PanelUnavailable {
                    reason: "tick deadline exceeded".into(),
                },
                other => CoreError::from(other).into(),
            },
        )
}

/// Format an optional timestamp in local time.
pub fn local_time(at: Option<chrono::DateTime<chrono::Utc>>, raw: &str) -> String {
    at.map_or_else(
        || raw.to_owned(),
        |t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        },
    )
}
