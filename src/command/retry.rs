//! Retry scheduling for unacknowledged commands

use super::tracker::CommandTracker;
use crate::mavlink::FrameIo;
use anyhow::Result;
use flight_link_shared::CommandStatus;
use tracing::warn;

/// Resends the outstanding command when it sits in `Sent` for too long
#[derive(Debug, Clone, Copy)]
pub struct RetryScheduler {
    timeout_ms: u64,
}

impl RetryScheduler {
    /// Create a scheduler with the given ack timeout
    pub fn new(timeout_ms: u64) -> Self {
        Self { timeout_ms }
    }

    /// Whether the outstanding command has gone unanswered for the full timeout
    ///
    /// Only `Sent` commands are ever due; `InProgress` and terminal commands
    /// are left alone.
    pub fn is_due(&self, tracker: &CommandTracker, now_ms: u64) -> bool {
        match tracker.outstanding() {
            Some(cmd) if cmd.status == CommandStatus::Sent => {
                now_ms.saturating_sub(cmd.sent_at) >= self.timeout_ms
            }
            _ => false,
        }
    }

    /// Resend if due; returns whether a resend occurred
    pub fn tick(
        &self,
        tracker: &mut CommandTracker,
        io: &mut impl FrameIo,
        now_ms: u64,
    ) -> Result<bool> {
        if !self.is_due(tracker, now_ms) {
            return Ok(false);
        }

        let resent = tracker.resend(io, now_ms)?;
        if let Some(cmd) = tracker.outstanding() {
            warn!(
                "{} not acknowledged, resent (confirmation={})",
                cmd.kind, cmd.confirmation
            );
        }
        Ok(resent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mavlink::{CommandCatalog, CommandKind};
    use crate::testing::RecordingIo;

    fn setup(kind: CommandKind) -> (CommandTracker, RecordingIo) {
        let mut io = RecordingIo::new();
        let mut tracker = CommandTracker::new(CommandCatalog::new(1, 0));
        tracker.issue(&mut io, kind, 1.0, 1000).unwrap();
        (tracker, io)
    }

    #[test]
    fn test_no_resend_before_timeout() {
        let (mut tracker, mut io) = setup(CommandKind::Arm);
        let scheduler = RetryScheduler::new(50);

        assert!(!scheduler.tick(&mut tracker, &mut io, 1049).unwrap());
        assert_eq!(io.sent.len(), 1);
        assert_eq!(tracker.status(), Some(CommandStatus::Sent));
    }

    #[test]
    fn test_resend_at_timeout() {
        let (mut tracker, mut io) = setup(CommandKind::Arm);
        let scheduler = RetryScheduler::new(50);

        assert!(scheduler.tick(&mut tracker, &mut io, 1050).unwrap());
        assert_eq!(io.sent.len(), 2);

        let cmd = tracker.outstanding().unwrap();
        assert_eq!(cmd.confirmation, 1);
        assert_eq!(cmd.sent_at, 1050);
    }

    #[test]
    fn test_repeated_tick_is_idempotent() {
        let (mut tracker, mut io) = setup(CommandKind::Takeoff);
        let scheduler = RetryScheduler::new(50);

        for _ in 0..5 {
            assert!(!scheduler.tick(&mut tracker, &mut io, 1020).unwrap());
        }
        assert_eq!(io.sent.len(), 1);

        // One resend, then the refreshed timestamp holds further ticks off
        assert!(scheduler.tick(&mut tracker, &mut io, 1060).unwrap());
        assert!(!scheduler.tick(&mut tracker, &mut io, 1060).unwrap());
        assert!(!scheduler.tick(&mut tracker, &mut io, 1109).unwrap());
        assert!(scheduler.tick(&mut tracker, &mut io, 1110).unwrap());
        assert_eq!(tracker.outstanding().unwrap().confirmation, 2);
    }

    #[test]
    fn test_only_sent_is_retried() {
        let scheduler = RetryScheduler::new(50);

        for status in [
            CommandStatus::InProgress,
            CommandStatus::Accepted,
            CommandStatus::Rejected,
        ] {
            let (mut tracker, mut io) = setup(CommandKind::ReturnToLaunch);
            tracker.update_status(status);

            assert!(!scheduler.is_due(&tracker, 10_000));
            assert!(!scheduler.tick(&mut tracker, &mut io, 10_000).unwrap());
            assert_eq!(io.sent.len(), 1);
        }
    }

    #[test]
    fn test_nothing_outstanding() {
        let mut io = RecordingIo::new();
        let mut tracker = CommandTracker::new(CommandCatalog::new(1, 0));
        let scheduler = RetryScheduler::new(50);
        assert!(!scheduler.tick(&mut tracker, &mut io, 10_000).unwrap());
        assert!(io.sent.is_empty());
    }

    #[test]
    fn test_clock_behind_sent_at() {
        let (mut tracker, mut io) = setup(CommandKind::Arm);
        let scheduler = RetryScheduler::new(50);
        assert!(!scheduler.tick(&mut tracker, &mut io, 10).unwrap());
    }
}
