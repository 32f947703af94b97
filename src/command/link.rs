//! Command link - issuance and polling surface over one frame transport

use super::correlator::{self, AckResult};
use super::retry::RetryScheduler;
use super::tracker::{CommandTracker, OutstandingCommand};
use crate::clock::MonotonicClock;
use crate::config::LinkConfig;
use crate::mavlink::{CommandCatalog, CommandKind, FrameIo};
use anyhow::Result;
use flight_link_shared::{link, CommandStatus};
use mavlink::ardupilotmega::MavMessage;
use tracing::info;

/// Owns the outstanding command and everything that acts on it
///
/// All calls are synchronous and expected from a single control loop.
pub struct CommandLink<IO, C> {
    io: IO,
    clock: C,
    catalog: CommandCatalog,
    tracker: CommandTracker,
    scheduler: RetryScheduler,
    operating_alt_m: f32,
    arm_condition: f32,
    disarm_condition: f32,
    stream_interval_us: f32,
}

impl<IO: FrameIo, C: MonotonicClock> CommandLink<IO, C> {
    /// Create a link over `io` using the startup configuration
    pub fn new(io: IO, clock: C, config: &LinkConfig) -> Self {
        let catalog = CommandCatalog::new(config.fc.target_system, config.fc.target_component);
        Self {
            io,
            clock,
            catalog,
            tracker: CommandTracker::new(catalog),
            scheduler: RetryScheduler::new(config.ack_timeout_ms),
            operating_alt_m: config.operating_alt_m,
            arm_condition: config.arm_condition,
            disarm_condition: config.disarm_condition,
            stream_interval_us: config.stream_interval_us,
        }
    }

    /// Issue `kind` with its configured parameter
    pub fn issue(&mut self, kind: CommandKind) -> Result<()> {
        let parameter = match kind {
            CommandKind::Arm => self.arm_condition,
            CommandKind::Disarm => self.disarm_condition,
            CommandKind::Takeoff => self.operating_alt_m,
            CommandKind::SetMessageInterval(_) => self.stream_interval_us,
            CommandKind::SetHomePosition => 1.0, // Use current location
            CommandKind::ReturnToLaunch | CommandKind::GetHomePosition => 0.0,
        };
        self.issue_with(kind, parameter)
    }

    fn issue_with(&mut self, kind: CommandKind, parameter: f32) -> Result<()> {
        let now = self.clock.now_ms();
        self.tracker.issue(&mut self.io, kind, parameter, now)
    }

    pub fn issue_arm(&mut self) -> Result<()> {
        self.issue(CommandKind::Arm)
    }

    pub fn issue_disarm(&mut self) -> Result<()> {
        self.issue(CommandKind::Disarm)
    }

    /// Take off and climb to the operating altitude
    pub fn issue_takeoff(&mut self) -> Result<()> {
        self.issue(CommandKind::Takeoff)
    }

    pub fn issue_return_to_launch(&mut self) -> Result<()> {
        self.issue(CommandKind::ReturnToLaunch)
    }

    /// Ask the autopilot to stream `stream_id` every `rate_us` microseconds
    pub fn issue_set_message_interval(&mut self, stream_id: u32, rate_us: f32) -> Result<()> {
        self.issue_with(CommandKind::SetMessageInterval(stream_id), rate_us)
    }

    /// GLOBAL_POSITION_INT at the configured stream interval
    pub fn request_position_stream(&mut self) -> Result<()> {
        self.issue(CommandKind::SetMessageInterval(link::MSG_ID_GLOBAL_POSITION_INT))
    }

    /// GPS_RAW_INT at the configured stream interval
    pub fn request_gps_fix_stream(&mut self) -> Result<()> {
        self.issue(CommandKind::SetMessageInterval(link::MSG_ID_GPS_RAW_INT))
    }

    pub fn issue_get_home_position(&mut self) -> Result<()> {
        self.issue(CommandKind::GetHomePosition)
    }

    /// Reset home to the vehicle's present position
    pub fn issue_set_home_position(&mut self) -> Result<()> {
        self.issue(CommandKind::SetHomePosition)
    }

    /// Fly to a position at the operating altitude
    ///
    /// Position targets are not acknowledged, so the outstanding command is
    /// left untouched.
    pub fn issue_set_position_target(&mut self, lat_e7: i32, lon_e7: i32) -> Result<()> {
        let time_boot_ms = self.clock.now_ms() as u32;
        info!(
            "Sending position target lat={} lon={} alt={}m",
            lat_e7, lon_e7, self.operating_alt_m
        );
        let frame =
            self.catalog
                .position_target(lat_e7, lon_e7, self.operating_alt_m, time_boot_ms);
        self.io.send(&frame)
    }

    pub fn status(&self) -> Option<CommandStatus> {
        self.tracker.status()
    }

    pub fn outstanding(&self) -> Option<&OutstandingCommand> {
        self.tracker.outstanding()
    }

    /// Whether the next tick at `now_ms` would resend
    pub fn resend_due(&self, now_ms: u64) -> bool {
        self.scheduler.is_due(&self.tracker, now_ms)
    }

    /// Apply an inbound frame to the outstanding command
    pub fn on_frame(&mut self, frame: &MavMessage) -> Option<AckResult> {
        correlator::on_frame(&mut self.tracker, frame)
    }

    /// Retry check; returns whether a resend occurred
    pub fn on_tick(&mut self, now_ms: u64) -> Result<bool> {
        self.scheduler.tick(&mut self.tracker, &mut self.io, now_ms)
    }

    /// Retry check against the link's own clock
    pub fn tick(&mut self) -> Result<bool> {
        let now = self.clock.now_ms();
        self.on_tick(now)
    }

    /// Drain available frames, returning the ones that are not acknowledgments
    pub fn poll(&mut self) -> Vec<MavMessage> {
        let mut others = Vec::new();
        while let Some(frame) = self.io.try_receive() {
            if self.on_frame(&frame).is_none() && !matches!(frame, MavMessage::COMMAND_ACK(_)) {
                others.push(frame);
            }
        }
        others
    }

    pub fn io(&self) -> &IO {
        &self.io
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ack, ManualClock, RecordingIo};
    use mavlink::ardupilotmega::{MavCmd, MavResult};

    fn link() -> (CommandLink<RecordingIo, ManualClock>, ManualClock) {
        let clock = ManualClock::default();
        let link = CommandLink::new(RecordingIo::new(), clock.clone(), &LinkConfig::default());
        (link, clock)
    }

    #[test]
    fn test_arm_scenario() {
        let (mut link, clock) = link();
        clock.set(1000);
        link.issue_arm().unwrap();
        assert_eq!(link.status(), Some(CommandStatus::Sent));

        clock.set(1049);
        assert!(!link.tick().unwrap());
        assert_eq!(link.io().sent.len(), 1);

        clock.set(1050);
        assert!(link.tick().unwrap());
        let sent = link.io().sent_commands();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].confirmation, 1);
        assert_eq!(sent[1].param1, 1.0);

        let result = link.on_frame(&ack(
            MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
            MavResult::MAV_RESULT_ACCEPTED,
        ));
        assert!(result.is_some());
        assert_eq!(link.status(), Some(CommandStatus::Accepted));

        for now in [1100, 1200, 5000] {
            assert!(!link.on_tick(now).unwrap());
        }
        assert_eq!(link.io().sent.len(), 2);
    }

    #[test]
    fn test_takeoff_denied_scenario() {
        let (mut link, clock) = link();
        link.issue_takeoff().unwrap();
        assert_eq!(link.io().sent_commands()[0].param7, 20.0);

        link.on_frame(&ack(MavCmd::MAV_CMD_NAV_TAKEOFF, MavResult::MAV_RESULT_DENIED));
        assert_eq!(link.status(), Some(CommandStatus::Rejected));

        for now in [50, 100, 1000, 60_000] {
            clock.set(now);
            assert!(!link.tick().unwrap());
        }
        assert_eq!(link.io().sent.len(), 1);
    }

    #[test]
    fn test_issue_parameters() {
        let (mut link, _clock) = link();
        link.issue_disarm().unwrap();
        link.issue_set_message_interval(24, 500_000.0).unwrap();
        link.request_position_stream().unwrap();
        link.request_gps_fix_stream().unwrap();
        link.issue_set_home_position().unwrap();
        link.issue_get_home_position().unwrap();
        link.issue_return_to_launch().unwrap();

        let sent = link.io().sent_commands();
        assert_eq!(sent[0].param1, 0.0);
        assert_eq!((sent[1].param1, sent[1].param2), (24.0, 500_000.0));
        assert_eq!((sent[2].param1, sent[2].param2), (33.0, 1_000_000.0));
        assert_eq!(sent[3].param1, 24.0);
        assert_eq!(sent[4].command, MavCmd::MAV_CMD_DO_SET_HOME);
        assert_eq!(sent[4].param1, 1.0);
        assert_eq!(sent[6].command, MavCmd::MAV_CMD_NAV_RETURN_TO_LAUNCH);
    }

    #[test]
    fn test_resend_keeps_custom_parameter() {
        let (mut link, _clock) = link();
        link.issue_set_message_interval(24, 250_000.0).unwrap();
        assert!(link.on_tick(50).unwrap());

        let sent = link.io().sent_commands();
        assert_eq!(sent[1].param1, 24.0);
        assert_eq!(sent[1].param2, 250_000.0);
        assert_eq!(sent[1].confirmation, 1);
    }

    #[test]
    fn test_position_target_is_untracked() {
        let (mut link, _clock) = link();
        link.issue_arm().unwrap();
        link.issue_set_position_target(473_977_420, 85_455_940).unwrap();

        assert_eq!(link.io().sent.len(), 2);
        assert!(matches!(
            link.io().sent[1],
            MavMessage::SET_POSITION_TARGET_GLOBAL_INT(_)
        ));
        assert_eq!(link.outstanding().unwrap().kind, CommandKind::Arm);
    }

    #[test]
    fn test_poll_routes_frames() {
        let (mut link, _clock) = link();
        link.issue_arm().unwrap();

        let other = CommandCatalog::new(1, 0).build(CommandKind::GetHomePosition, 0.0, 0);
        let mut io_frames = vec![
            ack(MavCmd::MAV_CMD_COMPONENT_ARM_DISARM, MavResult::MAV_RESULT_IN_PROGRESS),
            other.clone(),
            ack(MavCmd::MAV_CMD_COMPONENT_ARM_DISARM, MavResult::MAV_RESULT_CANCELLED),
        ];
        link.io.inbound.extend(io_frames.drain(..));

        let others = link.poll();
        assert_eq!(others, vec![other]);
        assert_eq!(link.status(), Some(CommandStatus::InProgress));
        assert!(link.poll().is_empty());
    }

    #[test]
    fn test_resend_due() {
        let (mut link, _clock) = link();
        assert!(!link.resend_due(1000));
        link.issue_arm().unwrap();
        assert!(!link.resend_due(49));
        assert!(link.resend_due(50));
    }

    #[test]
    fn test_offline_transport_is_an_error() {
        let clock = ManualClock::default();
        let mut io = RecordingIo::new();
        io.offline = true;
        let mut link = CommandLink::new(io, clock, &LinkConfig::default());
        assert!(link.issue_arm().is_err());
        assert!(link.issue_set_position_target(0, 0).is_err());
    }
}
