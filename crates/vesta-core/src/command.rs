// ── Arm-mode command dispatcher ──
//
// A command is only confirmed once a later tick's fresh status shows the
// target mode. The dispatcher never writes the snapshot itself; the
// coordinator reports each published status through `observe_tick`.

use std::sync::Mutex;
use std::sync::atomic::Ordering;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vesta_api::PanelApi;
use vesta_api::PanelTransport;
use vesta_api::models::CommandResponse;

use crate::coordinator::{Coordinator, lock};
use crate::error::CommandError;
use crate::model::ArmMode;

/// The command currently waiting for convergence.
pub(crate) struct PendingCommand {
    id: u64,
    target: ArmMode,
    /// Set once the panel acknowledged the POST. Ticks that started
    /// earlier never count toward convergence.
    acknowledged_at: Option<Instant>,
    observed_ticks: u32,
    done: oneshot::Sender<Result<(), CommandError>>,
}

/// Public view of the in-flight command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    pub target: ArmMode,
    pub acknowledged: bool,
    /// Ticks since acknowledgement that did not show the target.
    pub observed_ticks: u32,
}

/// Issues arm-mode changes and waits for the polled state to agree.
pub struct CommandDispatcher<T> {
    coordinator: Coordinator<T>,
}

impl<T: PanelTransport> CommandDispatcher<T> {
    pub(crate) fn new(coordinator: Coordinator<T>) -> Self {
        Self { coordinator }
    }

    pub fn in_flight(&self) -> Option<InFlight> {
        in_flight(&self.coordinator.inner.pending)
    }

    /// Switch the panel to `target` and wait until a poll confirms it.
    ///
    /// Only one command may be in flight; a second call returns
    /// `InProgress` carrying the pending target. Dropping the returned
    /// future before it resolves releases the slot.
    pub async fn set_arm_mode(&self, target: ArmMode) -> Result<(), CommandError> {
        let inner = &*self.coordinator.inner;
        let Some(code) = target.command_code() else {
            return Err(CommandError::Rejected {
                reason: format!("{target} is not a valid arm mode"),
            });
        };
        if inner.cancel.is_cancelled() {
            return Err(CommandError::Abandoned);
        }

        let (done, outcome) = oneshot::channel();
        let id = inner.next_command_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut slot = lock(&inner.pending);
            if let Some(pending) = slot.as_ref() {
                return Err(CommandError::InProgress {
                    target: pending.target.clone(),
                });
            }
            *slot = Some(PendingCommand {
                id,
                target: target.clone(),
                acknowledged_at: None,
                observed_ticks: 0,
                done,
            });
        }
        let _slot = SlotGuard {
            pending: &inner.pending,
            id,
        };

        let area = inner.settings.area;
        info!(mode = %target, area, "sending arm-mode command");
        let body = inner.transport.post_arm_mode(area, code).await?;
        check_acknowledgement(&body)?;

        {
            let mut slot = lock(&inner.pending);
            match slot.as_mut() {
                Some(pending) if pending.id == id => {
                    pending.acknowledged_at = Some(Instant::now());
                }
                // Cleared by shutdown while the POST was in flight.
                _ => return Err(CommandError::Abandoned),
            }
        }
        debug!(mode = %target, "command acknowledged, waiting for convergence");
        self.coordinator.refresh_now();

        let deadline = Instant::now() + inner.settings.convergence_deadline();
        tokio::select! {
            biased;
            result = outcome => result.unwrap_or(Err(CommandError::Abandoned)),
            () = tokio::time::sleep_until(deadline) => {
                let observed = inner.store.current().panel.arm_mode.clone();
                warn!(mode = %target, %observed, "arm-mode command did not converge before deadline");
                Err(CommandError::Timeout { target, observed })
            }
        }
    }
}

fn check_acknowledgement(body: &[u8]) -> Result<(), CommandError> {
    let ack: CommandResponse =
        serde_json::from_slice(body).map_err(|e| CommandError::Rejected {
            reason: format!("unreadable acknowledgement: {e}"),
        })?;
    if ack.result == Some(1) {
        return Ok(());
    }
    let reason = ack.message.unwrap_or_else(|| match ack.result {
        Some(code) => format!("panel answered result {code}"),
        None => "panel answered without a result".into(),
    });
    Err(CommandError::Rejected { reason })
}

/// Clears the slot if its command is still the one we registered.
struct SlotGuard<'a> {
    pending: &'a Mutex<Option<PendingCommand>>,
    id: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut slot = lock(self.pending);
        if slot.as_ref().is_some_and(|p| p.id == self.id) {
            *slot = None;
        }
    }
}

pub(crate) fn in_flight(pending: &Mutex<Option<PendingCommand>>) -> Option<InFlight> {
    lock(pending).as_ref().map(|p| InFlight {
        target: p.target.clone(),
        acknowledged: p.acknowledged_at.is_some(),
        observed_ticks: p.observed_ticks,
    })
}

/// Feed one published status into the pending command, if any.
pub(crate) fn observe_tick(
    pending: &Mutex<Option<PendingCommand>>,
    observed: &ArmMode,
    tick_started: Instant,
    ceiling: u32,
) {
    let mut slot = lock(pending);
    let Some(command) = slot.as_mut() else {
        return;
    };
    let Some(acknowledged_at) = command.acknowledged_at else {
        return;
    };
    if tick_started < acknowledged_at {
        return;
    }

    if *observed == command.target {
        if let Some(command) = slot.take() {
            info!(mode = %command.target, "arm-mode command confirmed by panel");
            let _ = command.done.send(Ok(()));
        }
        return;
    }

    command.observed_ticks += 1;
    if command.observed_ticks >= ceiling {
        if let Some(command) = slot.take() {
            warn!(
                mode = %command.target,
                %observed,
                ticks = command.observed_ticks,
                "arm-mode command did not converge"
            );
            let _ = command.done.send(Err(CommandError::Timeout {
                target: command.target,
                observed: observed.clone(),
            }));
        }
    }
}

/// Drop the pending command; its caller sees `Abandoned`.
pub(crate) fn abandon(pending: &Mutex<Option<PendingCommand>>) {
    if let Some(command) = lock(pending).take() {
        debug!(mode = %command.target, "abandoning in-flight command");
    }
}
