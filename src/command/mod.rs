//! Command/acknowledgment layer for the flight controller
//!
//! This module handles:
//! - Tracking the single outstanding command and its status
//! - Correlating COMMAND_ACK frames with that command
//! - Resending commands that go unacknowledged
//! - Running serial command sequences on top of the link

mod correlator;
mod link;
mod retry;
mod sequencer;
mod tracker;

pub use correlator::{decode_ack, AckResult};
pub use link::CommandLink;
pub use retry::RetryScheduler;
pub use sequencer::{SequenceState, Sequencer, Step};
pub use tracker::{CommandTracker, OutstandingCommand};
