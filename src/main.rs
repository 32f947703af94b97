use anyhow::{bail, Context, Result};
use flight_link::mavlink::MavlinkLink;
use flight_link::{CommandLink, LinkConfig, SequenceState, Sequencer, SystemClock};
use mavlink::ardupilotmega::MavMessage;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, trace};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = LinkConfig::from_env().context("Invalid configuration")?;

    info!("Flight link starting");
    info!("  Connection: {}", config.fc.connection.address());
    info!(
        "  Ack timeout: {}ms, tick: {}ms",
        config.ack_timeout_ms, config.tick_interval_ms
    );
    info!("  Sequence: {} step(s)", config.sequence.len());

    let fc_link = MavlinkLink::connect(&config.fc)?;
    let mut link = CommandLink::new(fc_link, SystemClock::new(), &config);
    let mut sequencer = Sequencer::new(config.sequence.clone(), config.max_retries);

    let mut ticker = interval(Duration::from_millis(config.tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Main control loop
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return Ok(());
            }
        }

        if !link.io().is_connected() {
            bail!("Flight controller connection lost");
        }

        for frame in link.poll() {
            handle_fc_frame(&frame);
        }

        let now = link.now_ms();
        match sequencer.step(&mut link, now)? {
            SequenceState::Running => {}
            SequenceState::Finished => {
                info!("Command sequence complete");
                return Ok(());
            }
            SequenceState::Rejected(kind) => {
                error!("Autopilot rejected {}", kind);
                bail!("{} rejected", kind);
            }
            SequenceState::GaveUp(kind) => {
                bail!("{} was never acknowledged", kind);
            }
        }

        link.on_tick(now)?;
    }
}

/// Log frames that are not command acknowledgments
fn handle_fc_frame(frame: &MavMessage) {
    match frame {
        MavMessage::HEARTBEAT(hb) => {
            trace!(
                "[FC] Heartbeat: mode={} custom={}",
                hb.base_mode.bits(),
                hb.custom_mode
            );
        }
        MavMessage::GLOBAL_POSITION_INT(pos) => {
            debug!(
                "[FC] Position: lat={:.7} lon={:.7} rel_alt={:.1}m",
                pos.lat as f64 / 1e7,
                pos.lon as f64 / 1e7,
                pos.relative_alt as f32 / 1000.0
            );
        }
        MavMessage::HOME_POSITION(home) => {
            info!(
                "[FC] Home: lat={:.7} lon={:.7} alt={:.1}m",
                home.latitude as f64 / 1e7,
                home.longitude as f64 / 1e7,
                home.altitude as f32 / 1000.0
            );
        }
        MavMessage::STATUSTEXT(text) => {
            let text_str = String::from_utf8_lossy(&text.text).to_string();
            info!("[FC] {}", text_str.trim_end_matches('\0'));
        }
        _ => {}
    }
}
