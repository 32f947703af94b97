//! Serial command sequencer
//!
//! Issues one step at a time and only moves on once the autopilot has
//! accepted the previous command.

use super::link::CommandLink;
use crate::clock::MonotonicClock;
use crate::mavlink::{CommandKind, FrameIo};
use anyhow::{anyhow, bail, Context, Result};
use flight_link_shared::CommandStatus;
use std::collections::VecDeque;
use std::str::FromStr;
use tracing::{error, info, warn};

/// One entry of a command sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Acknowledged command; the sequence waits for acceptance
    Command(CommandKind),
    /// Fire-and-forget position target
    Goto { lat_e7: i32, lon_e7: i32 },
}

/// Parses a command name or `goto:<lat>;<lon>` in degrees
impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let Some(coords) = s.strip_prefix("goto:") else {
            return Ok(Step::Command(s.parse()?));
        };

        let (lat, lon) = coords
            .split_once(';')
            .ok_or_else(|| anyhow!("Position target needs <lat>;<lon>: {}", s))?;
        let lat: f64 = lat
            .trim()
            .parse()
            .with_context(|| format!("Invalid latitude: {}", lat))?;
        let lon: f64 = lon
            .trim()
            .parse()
            .with_context(|| format!("Invalid longitude: {}", lon))?;

        if !(-90.0..=90.0).contains(&lat) {
            bail!("Latitude out of range: {}", lat);
        }
        if !(-180.0..=180.0).contains(&lon) {
            bail!("Longitude out of range: {}", lon);
        }

        Ok(Step::Goto {
            lat_e7: (lat * 1e7).round() as i32,
            lon_e7: (lon * 1e7).round() as i32,
        })
    }
}

/// Where the sequence stands after a step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SequenceState {
    /// A command is outstanding or the next step was just issued
    Running,
    /// Every step completed
    Finished,
    /// The autopilot declined a command; the sequence stops
    Rejected(CommandKind),
    /// Retry cap reached without any acknowledgment
    GaveUp(CommandKind),
}

/// Runs a queue of steps through a [`CommandLink`]
pub struct Sequencer {
    steps: VecDeque<Step>,
    current: Option<CommandKind>,
    max_retries: Option<u8>,
}

impl Sequencer {
    pub fn new(steps: impl IntoIterator<Item = Step>, max_retries: Option<u8>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            current: None,
            max_retries,
        }
    }

    /// Steps not yet issued
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }

    /// Advance the sequence; call once per control loop iteration before the retry tick
    pub fn step<IO: FrameIo, C: MonotonicClock>(
        &mut self,
        link: &mut CommandLink<IO, C>,
        now_ms: u64,
    ) -> Result<SequenceState> {
        if let Some(kind) = self.current {
            match link.outstanding() {
                Some(cmd) if cmd.kind == kind => match cmd.status {
                    CommandStatus::Accepted => {
                        info!("{} accepted", kind);
                        self.current = None;
                    }
                    CommandStatus::Rejected => {
                        error!("{} rejected by autopilot, stopping sequence", kind);
                        return Ok(SequenceState::Rejected(kind));
                    }
                    CommandStatus::Sent
                        if self.retries_exhausted(cmd.confirmation) && link.resend_due(now_ms) =>
                    {
                        error!(
                            "{} unacknowledged after {} resends, giving up",
                            kind, cmd.confirmation
                        );
                        return Ok(SequenceState::GaveUp(kind));
                    }
                    _ => return Ok(SequenceState::Running),
                },
                _ => {
                    warn!("{} was superseded outside the sequence", kind);
                    self.current = None;
                }
            }
        }

        while let Some(step) = self.steps.pop_front() {
            match step {
                Step::Command(kind) => {
                    link.issue(kind)?;
                    self.current = Some(kind);
                    return Ok(SequenceState::Running);
                }
                Step::Goto { lat_e7, lon_e7 } => {
                    link.issue_set_position_target(lat_e7, lon_e7)?;
                }
            }
        }

        Ok(SequenceState::Finished)
    }

    fn retries_exhausted(&self, confirmation: u8) -> bool {
        self.max_retries.is_some_and(|max| confirmation >= max)
    }
}
