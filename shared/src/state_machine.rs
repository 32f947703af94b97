//! Command Status State Machine
//!
//! Defines the valid status transitions of one outstanding command instance.
//!
//! ```text
//! Sent --(in-progress)--> InProgress --(accepted)--> Accepted
//! Sent --(accepted)----------------------------------> Accepted
//! Sent | InProgress --(rejected kinds)--------------> Rejected
//! ```
//!
//! `Accepted` and `Rejected` are terminal. Timeouts are handled by the retry
//! scheduler and never pass through here.

use crate::AckOutcome;

/// Status of the outstanding command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// Transmitted, awaiting any response
    Sent,
    /// Vehicle received the command and is still executing it
    InProgress,
    /// Vehicle confirmed acceptance
    Accepted,
    /// Vehicle explicitly declined
    Rejected,
}

/// Result of applying an acknowledgment to a status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and the status is now the contained value
    Success(CommandStatus),
    /// Outcome has no effect from the current status
    Ignored {
        from: CommandStatus,
        outcome: AckOutcome,
    },
}

impl CommandStatus {
    /// Terminal statuses never change for the same command instance
    pub fn is_terminal(self) -> bool {
        matches!(self, CommandStatus::Accepted | CommandStatus::Rejected)
    }

    /// Apply an acknowledgment outcome to this status
    pub fn apply(self, outcome: AckOutcome) -> TransitionResult {
        let to = outcome.status();
        if is_valid_transition(self, to) {
            TransitionResult::Success(to)
        } else {
            TransitionResult::Ignored {
                from: self,
                outcome,
            }
        }
    }
}

/// Check if a transition from one status to another is allowed
pub fn is_valid_transition(from: CommandStatus, to: CommandStatus) -> bool {
    use CommandStatus::*;

    match (from, to) {
        (Sent, InProgress | Accepted | Rejected) => true,
        (InProgress, InProgress | Accepted | Rejected) => true,
        _ => false,
    }
}
