//! Flight Link
//!
//! Command/acknowledgment layer between a control computer and a MAVLink
//! autopilot: issues discrete commands, tracks whether each was accepted,
//! and resends commands that go unacknowledged.

pub mod clock;
pub mod command;
pub mod config;
pub mod mavlink;

#[cfg(test)]
mod testing;

pub use clock::{MonotonicClock, SystemClock};
pub use command::{CommandLink, SequenceState, Sequencer, Step};
pub use config::LinkConfig;
pub use flight_link_shared::{AckOutcome, CommandStatus};
