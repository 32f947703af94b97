//! Outstanding-command tracker - owns the single in-flight command

use crate::mavlink::{CommandCatalog, CommandKind, FrameIo};
use anyhow::Result;
use flight_link_shared::state_machine::is_valid_transition;
use flight_link_shared::CommandStatus;
use tracing::{debug, info, warn};

/// The one command currently awaiting a terminal acknowledgment
#[derive(Debug, Clone, PartialEq)]
pub struct OutstandingCommand {
    pub kind: CommandKind,
    pub parameter: f32,
    /// Incremented on every resend so the vehicle can tell retries apart
    pub confirmation: u8,
    /// Monotonic time of the last transmission (ms)
    pub sent_at: u64,
    pub status: CommandStatus,
}

/// Tracks the single outstanding command and rebuilds it for resends
pub struct CommandTracker {
    catalog: CommandCatalog,
    outstanding: Option<OutstandingCommand>,
}

impl CommandTracker {
    /// Create a tracker with nothing outstanding
    pub fn new(catalog: CommandCatalog) -> Self {
        Self {
            catalog,
            outstanding: None,
        }
    }

    /// Start a fresh command, abandoning any unresolved one
    pub fn issue(
        &mut self,
        io: &mut impl FrameIo,
        kind: CommandKind,
        parameter: f32,
        now_ms: u64,
    ) -> Result<()> {
        if let Some(prev) = &self.outstanding {
            if !prev.status.is_terminal() {
                warn!(
                    "Abandoning {} ({:?}) in favour of {}",
                    prev.kind, prev.status, kind
                );
            }
        }

        self.outstanding = Some(OutstandingCommand {
            kind,
            parameter,
            confirmation: 0,
            sent_at: now_ms,
            status: CommandStatus::Sent,
        });

        info!("Sending {} (param={})", kind, parameter);
        io.send(&self.catalog.build(kind, parameter, 0))
    }

    /// Resend the outstanding command with the next confirmation value
    ///
    /// Returns false when nothing has been issued yet or the command is
    /// already accepted or rejected.
    pub(super) fn resend(&mut self, io: &mut impl FrameIo, now_ms: u64) -> Result<bool> {
        let Some(cmd) = self.outstanding.as_mut() else {
            return Ok(false);
        };
        if cmd.status.is_terminal() {
            return Ok(false);
        }

        cmd.confirmation = cmd.confirmation.wrapping_add(1);
        cmd.sent_at = now_ms;
        cmd.status = CommandStatus::Sent;

        let frame = self.catalog.build(cmd.kind, cmd.parameter, cmd.confirmation);
        io.send(&frame)?;
        Ok(true)
    }

    /// Status of the outstanding command, if any has been issued
    pub fn status(&self) -> Option<CommandStatus> {
        self.outstanding.as_ref().map(|cmd| cmd.status)
    }

    /// Read-only view of the outstanding command
    pub fn outstanding(&self) -> Option<&OutstandingCommand> {
        self.outstanding.as_ref()
    }

    /// Move the outstanding command to `new_status`
    ///
    /// Only transitions allowed by the status state machine are applied;
    /// returns whether the status changed.
    pub(super) fn update_status(&mut self, new_status: CommandStatus) -> bool {
        let Some(cmd) = self.outstanding.as_mut() else {
            return false;
        };

        if !is_valid_transition(cmd.status, new_status) {
            debug!(
                "Ignoring {:?} -> {:?} for {}",
                cmd.status, new_status, cmd.kind
            );
            return false;
        }

        cmd.status = new_status;
        true
    }
}
