//! MAVLink Bridge Module
//!
//! Frame I/O with ArduPilot/PX4 flight controllers and the catalog of
//! acknowledged commands sent to them.

mod catalog;
mod connection;

pub use catalog::{CommandCatalog, CommandKind};
pub use connection::{FcConfig, FcConnectionType, FrameIo, MavlinkLink};
