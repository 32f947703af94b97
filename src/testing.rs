//! In-memory doubles for the command layer tests

use crate::clock::MonotonicClock;
use crate::mavlink::FrameIo;
use anyhow::{bail, Result};
use mavlink::ardupilotmega::{MavCmd, MavMessage, MavResult, COMMAND_ACK_DATA, COMMAND_LONG_DATA};
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Frame I/O that records what was sent and replays queued inbound frames
#[derive(Default)]
pub struct RecordingIo {
    pub inbound: VecDeque<MavMessage>,
    pub sent: Vec<MavMessage>,
    pub offline: bool,
}

impl RecordingIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// COMMAND_LONG payloads sent so far
    pub fn sent_commands(&self) -> Vec<COMMAND_LONG_DATA> {
        self.sent
            .iter()
            .filter_map(|msg| match msg {
                MavMessage::COMMAND_LONG(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }
}

impl FrameIo for RecordingIo {
    fn try_receive(&mut self) -> Option<MavMessage> {
        self.inbound.pop_front()
    }

    fn send(&mut self, frame: &MavMessage) -> Result<()> {
        if self.offline {
            bail!("Flight controller link is down");
        }
        self.sent.push(frame.clone());
        Ok(())
    }
}

/// Clock advanced by hand, shared between the test and the link
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn set(&self, now_ms: u64) {
        self.now.set(now_ms);
    }
}

impl MonotonicClock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// COMMAND_ACK frame for `command` with `result`
pub fn ack(command: MavCmd, result: MavResult) -> MavMessage {
    MavMessage::COMMAND_ACK(COMMAND_ACK_DATA {
        command,
        result,
    })
}
