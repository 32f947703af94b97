//! Link configuration from environment.

use crate::command::Step;
use crate::mavlink::{FcConfig, FcConnectionType};
use anyhow::{anyhow, bail, Context, Result};
use flight_link_shared::link;
use std::env::{self, VarError};
use std::str::FromStr;

/// Startup configuration; never changes once the link is running
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Flight controller connection and MAVLink ids
    pub fc: FcConfig,
    /// Time in `Sent` before a command is resent
    pub ack_timeout_ms: u64,
    /// Control loop period, must not exceed the ack timeout
    pub tick_interval_ms: u64,
    /// Altitude used by takeoff and position targets
    pub operating_alt_m: f32,
    pub arm_condition: f32,
    pub disarm_condition: f32,
    /// Interval requested for telemetry streams
    pub stream_interval_us: f32,
    /// Resends allowed before the sequencer gives up (unbounded if unset)
    pub max_retries: Option<u8>,
    /// Steps the binary runs after connecting
    pub sequence: Vec<Step>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            fc: FcConfig::default(),
            ack_timeout_ms: link::NO_ACK_TIMEOUT_MS,
            tick_interval_ms: 10,
            operating_alt_m: link::OPERATING_ALT_M,
            arm_condition: link::ARM_CONDITION,
            disarm_condition: link::DISARM_CONDITION,
            stream_interval_us: link::STREAM_INTERVAL_US,
            max_retries: None,
            sequence: Vec::new(),
        }
    }
}

impl LinkConfig {
    /// Defaults overridden by `FLIGHT_LINK_*` variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(conn) = var_parsed::<FcConnectionType>("FLIGHT_LINK_CONNECTION")? {
            config.fc.connection = conn;
        }
        if let Some(timeout) = var_parsed("FLIGHT_LINK_ACK_TIMEOUT_MS")? {
            config.ack_timeout_ms = timeout;
        }
        if let Some(tick) = var_parsed("FLIGHT_LINK_TICK_MS")? {
            config.tick_interval_ms = tick;
        }
        if let Some(alt) = var_parsed("FLIGHT_LINK_OPERATING_ALT_M")? {
            config.operating_alt_m = alt;
        }
        config.max_retries = var_parsed("FLIGHT_LINK_MAX_RETRIES")?;
        if let Some(sequence) = var("FLIGHT_LINK_SEQUENCE")? {
            config.sequence = parse_sequence(&sequence)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would break bounded retry latency
    pub fn validate(&self) -> Result<()> {
        if self.ack_timeout_ms == 0 {
            bail!("Ack timeout must be greater than zero");
        }
        if self.tick_interval_ms == 0 || self.tick_interval_ms > self.ack_timeout_ms {
            bail!(
                "Tick interval {}ms must be between 1 and the ack timeout ({}ms)",
                self.tick_interval_ms,
                self.ack_timeout_ms
            );
        }
        Ok(())
    }
}

/// Comma-separated list of steps, e.g. `stream:33,get-home,arm,takeoff`
///
/// Position targets use `;` inside the step: `goto:47.3977;8.5456`.
pub fn parse_sequence(s: &str) -> Result<Vec<Step>> {
    s.split(',')
        .filter(|step| !step.trim().is_empty())
        .map(|step| step.parse())
        .collect()
}

fn var_parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name)? {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("Invalid {}={}", name, value)),
        None => Ok(None),
    }
}

/// Unset is `None`; a value that is not valid unicode is an error
fn var(name: &str) -> Result<Option<String>> {
    match env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Invalid {}", name)),
    }
}
