//! Flight Link Shared Protocol Types
//!
//! This crate provides the codec-independent pieces of the command layer:
//! the per-command status state machine, the decoded acknowledgment
//! taxonomy, and the link constants used by the flight controller bridge.

pub mod state_machine;

use thiserror::Error;

pub use state_machine::{CommandStatus, TransitionResult};

/// Link parameters for talking to the autopilot
pub mod link {
    /// System ID of this control computer
    pub const SYSTEM_ID: u8 = 255;

    /// Component ID of this control computer
    pub const COMPONENT_ID: u8 = 1;

    /// Target system (the autopilot)
    pub const TARGET_SYSTEM: u8 = 1;

    /// Target component (0 = all components)
    pub const TARGET_COMPONENT: u8 = 0;

    /// Time without any acknowledgment before a command is resent
    pub const NO_ACK_TIMEOUT_MS: u64 = 50;

    /// Altitude (relative to home) used for takeoff and position targets
    pub const OPERATING_ALT_M: f32 = 20.0;

    /// param1 value for MAV_CMD_COMPONENT_ARM_DISARM that arms
    pub const ARM_CONDITION: f32 = 1.0;

    /// param1 value for MAV_CMD_COMPONENT_ARM_DISARM that disarms
    pub const DISARM_CONDITION: f32 = 0.0;

    /// GLOBAL_POSITION_INT message id
    pub const MSG_ID_GLOBAL_POSITION_INT: u32 = 33;

    /// GPS_RAW_INT message id
    pub const MSG_ID_GPS_RAW_INT: u32 = 24;

    /// Default telemetry stream interval (1 Hz)
    pub const STREAM_INTERVAL_US: f32 = 1_000_000.0;
}

/// Errors raised while decoding protocol values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown command result code: {0}")]
    UnknownResult(u8),
}

/// Outcome reported by a command acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Accepted,
    TemporarilyRejected,
    Denied,
    Unsupported,
    Failed,
    InProgress,
}

impl AckOutcome {
    /// Status a command moves to when this outcome arrives
    pub fn status(self) -> CommandStatus {
        match self {
            AckOutcome::Accepted => CommandStatus::Accepted,
            AckOutcome::InProgress => CommandStatus::InProgress,
            AckOutcome::TemporarilyRejected
            | AckOutcome::Denied
            | AckOutcome::Unsupported
            | AckOutcome::Failed => CommandStatus::Rejected,
        }
    }

    /// True for the four outcomes that decline the command
    pub fn is_rejection(self) -> bool {
        self.status() == CommandStatus::Rejected
    }
}

/// Decodes a MAV_RESULT code
impl TryFrom<u8> for AckOutcome {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(AckOutcome::Accepted),
            1 => Ok(AckOutcome::TemporarilyRejected),
            2 => Ok(AckOutcome::Denied),
            3 => Ok(AckOutcome::Unsupported),
            4 => Ok(AckOutcome::Failed),
            5 => Ok(AckOutcome::InProgress),
            other => Err(ProtocolError::UnknownResult(other)),
        }
    }
}
