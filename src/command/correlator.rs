//! Acknowledgment correlator - applies COMMAND_ACK frames to the tracker

use super::tracker::CommandTracker;
use flight_link_shared::{AckOutcome, TransitionResult};
use mavlink::ardupilotmega::{MavCmd, MavMessage};
use tracing::{debug, info, warn};

/// Decoded acknowledgment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AckResult {
    /// Command identifier being acknowledged
    pub command: MavCmd,
    pub outcome: AckOutcome,
}

/// Decode a COMMAND_ACK frame; anything else is not ours
pub fn decode_ack(frame: &MavMessage) -> Option<AckResult> {
    let MavMessage::COMMAND_ACK(ack) = frame else {
        return None;
    };

    match AckOutcome::try_from(ack.result as u8) {
        Ok(outcome) => Some(AckResult {
            command: ack.command,
            outcome,
        }),
        Err(e) => {
            debug!("Ignoring ACK for {:?}: {}", ack.command, e);
            None
        }
    }
}

/// Feed an inbound frame to the tracker
///
/// Acks whose command identifier does not match the outstanding command are
/// returned but leave the tracker untouched.
pub fn on_frame(tracker: &mut CommandTracker, frame: &MavMessage) -> Option<AckResult> {
    let result = decode_ack(frame)?;

    let Some(cmd) = tracker.outstanding() else {
        debug!("ACK for {:?} with nothing outstanding", result.command);
        return Some(result);
    };

    if cmd.kind.wire_command() != result.command {
        debug!(
            "ACK for {:?} does not match outstanding {}",
            result.command, cmd.kind
        );
        return Some(result);
    }

    let kind = cmd.kind;
    match cmd.status.apply(result.outcome) {
        TransitionResult::Success(status) => {
            if tracker.update_status(status) {
                if result.outcome.is_rejection() {
                    warn!("{} rejected: {:?}", kind, result.outcome);
                } else {
                    info!("{} -> {:?}", kind, status);
                }
            }
        }
        TransitionResult::Ignored { from, outcome } => {
            debug!("{} already {:?}, ignoring {:?}", kind, from, outcome);
        }
    }

    Some(result)
}
