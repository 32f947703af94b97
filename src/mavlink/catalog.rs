//! MAVLink Command Catalog
//!
//! Maps each acknowledged command kind onto its COMMAND_LONG encoding.

use anyhow::{anyhow, bail, Context, Result};
use mavlink::ardupilotmega::{
    MavCmd, MavFrame, MavMessage, PositionTargetTypemask, COMMAND_LONG_DATA,
    SET_POSITION_TARGET_GLOBAL_INT_DATA,
};
use std::fmt;
use std::str::FromStr;

/// Commands tracked by the acknowledgment layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Arm,
    Disarm,
    Takeoff,
    ReturnToLaunch,
    /// Request a telemetry stream by MAVLink message id
    SetMessageInterval(u32),
    GetHomePosition,
    SetHomePosition,
}

impl CommandKind {
    /// MAV_CMD identifier this kind is sent as (and acknowledged with)
    pub fn wire_command(self) -> MavCmd {
        match self {
            CommandKind::Arm | CommandKind::Disarm => MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
            CommandKind::Takeoff => MavCmd::MAV_CMD_NAV_TAKEOFF,
            CommandKind::ReturnToLaunch => MavCmd::MAV_CMD_NAV_RETURN_TO_LAUNCH,
            CommandKind::SetMessageInterval(_) => MavCmd::MAV_CMD_SET_MESSAGE_INTERVAL,
            #[allow(deprecated)]
            CommandKind::GetHomePosition => MavCmd::MAV_CMD_GET_HOME_POSITION,
            CommandKind::SetHomePosition => MavCmd::MAV_CMD_DO_SET_HOME,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Arm => write!(f, "ARM"),
            CommandKind::Disarm => write!(f, "DISARM"),
            CommandKind::Takeoff => write!(f, "TAKEOFF"),
            CommandKind::ReturnToLaunch => write!(f, "RTL"),
            CommandKind::SetMessageInterval(id) => write!(f, "SET_MESSAGE_INTERVAL({})", id),
            CommandKind::GetHomePosition => write!(f, "GET_HOME_POSITION"),
            CommandKind::SetHomePosition => write!(f, "SET_HOME_POSITION"),
        }
    }
}

/// Parses `arm`, `disarm`, `takeoff`, `rtl`, `get-home`, `set-home` or `stream:<msg id>`
impl FromStr for CommandKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        if let Some(id) = s.strip_prefix("stream:") {
            let id = id
                .parse()
                .with_context(|| format!("Invalid stream message id: {}", id))?;
            return Ok(CommandKind::SetMessageInterval(id));
        }

        match s.as_str() {
            "arm" => Ok(CommandKind::Arm),
            "disarm" => Ok(CommandKind::Disarm),
            "takeoff" => Ok(CommandKind::Takeoff),
            "rtl" => Ok(CommandKind::ReturnToLaunch),
            "get-home" => Ok(CommandKind::GetHomePosition),
            "set-home" => Ok(CommandKind::SetHomePosition),
            "" => bail!("Empty command"),
            other => Err(anyhow!("Unknown command: {}", other)),
        }
    }
}

/// Builds the frames sent to the flight controller
#[derive(Debug, Clone, Copy)]
pub struct CommandCatalog {
    target_system: u8,
    target_component: u8,
}

impl CommandCatalog {
    /// Create a catalog addressing the given autopilot
    pub fn new(target_system: u8, target_component: u8) -> Self {
        Self {
            target_system,
            target_component,
        }
    }

    /// Encode `kind` with its parameter as a COMMAND_LONG frame
    ///
    /// `parameter` lands in the slot the command uses for it: the arm
    /// condition, the takeoff altitude, the stream interval in microseconds
    /// or the set-home "use current location" flag. RTL and home position
    /// requests carry no parameter.
    pub fn build(&self, kind: CommandKind, parameter: f32, confirmation: u8) -> MavMessage {
        let mut params = [0.0f32; 7];
        match kind {
            CommandKind::Arm | CommandKind::Disarm | CommandKind::SetHomePosition => {
                params[0] = parameter;
            }
            CommandKind::Takeoff => {
                params[6] = parameter;
            }
            CommandKind::SetMessageInterval(message_id) => {
                params[0] = message_id as f32;
                params[1] = parameter;
            }
            CommandKind::ReturnToLaunch | CommandKind::GetHomePosition => {}
        }

        MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
            target_system: self.target_system,
            target_component: self.target_component,
            command: kind.wire_command(),
            confirmation,
            param1: params[0],
            param2: params[1],
            param3: params[2],
            param4: params[3],
            param5: params[4],
            param6: params[5],
            param7: params[6],
        })
    }

    /// Guided-mode position target, relative altitude, position fields only
    pub fn position_target(
        &self,
        lat_e7: i32,
        lon_e7: i32,
        alt_m: f32,
        time_boot_ms: u32,
    ) -> MavMessage {
        let type_mask = PositionTargetTypemask::POSITION_TARGET_TYPEMASK_VX_IGNORE
            | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_VY_IGNORE
            | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_VZ_IGNORE
            | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_AX_IGNORE
            | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_AY_IGNORE
            | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_AZ_IGNORE
            | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_YAW_IGNORE
            | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_YAW_RATE_IGNORE;

        MavMessage::SET_POSITION_TARGET_GLOBAL_INT(SET_POSITION_TARGET_GLOBAL_INT_DATA {
            time_boot_ms,
            target_system: self.target_system,
            target_component: self.target_component,
            coordinate_frame: MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
            type_mask,
            lat_int: lat_e7,
            lon_int: lon_e7,
            alt: alt_m,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            afx: 0.0,
            afy: 0.0,
            afz: 0.0,
            yaw: 0.0,
            yaw_rate: 0.0,
        })
    }
}
