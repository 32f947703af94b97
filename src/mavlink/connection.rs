//! Flight Controller Connection
//!
//! Frame-level I/O with the autopilot over serial, UDP or TCP.

use anyhow::{anyhow, bail, Context, Result};
use flight_link_shared::link;
use mavlink::ardupilotmega::MavMessage;
use mavlink::error::MessageReadError;
use mavlink::{MavConnection, MavHeader};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Inbound frames buffered between the reader thread and the control loop
const INBOUND_CAPACITY: usize = 100;

/// Non-blocking frame transport used by the command layer
pub trait FrameIo {
    /// Return the next fully decoded frame, if one is available
    fn try_receive(&mut self) -> Option<MavMessage>;

    /// Serialize and transmit a frame
    fn send(&mut self, frame: &MavMessage) -> Result<()>;
}

/// Connection type for flight controller
#[derive(Debug, Clone, PartialEq)]
pub enum FcConnectionType {
    /// Serial port connection (e.g., "/dev/ttyACM0" or "/dev/serial0")
    Serial { port: String, baud: u32 },
    /// UDP connection (e.g., "127.0.0.1:14550")
    Udp { address: String },
    /// TCP connection (e.g., "127.0.0.1:5760")
    Tcp { address: String },
}

impl Default for FcConnectionType {
    fn default() -> Self {
        // Default to SITL UDP for development
        Self::Udp {
            address: "127.0.0.1:14550".into(),
        }
    }
}

impl FcConnectionType {
    /// Connection string understood by `mavlink::connect`
    pub fn address(&self) -> String {
        match self {
            FcConnectionType::Serial { port, baud } => format!("serial:{}:{}", port, baud),
            FcConnectionType::Udp { address } => format!("udpin:{}", address),
            FcConnectionType::Tcp { address } => format!("tcpout:{}", address),
        }
    }
}

/// Parses `serial:<port>:<baud>`, `udp:<address>` or `tcp:<address>`
impl FromStr for FcConnectionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (scheme, rest) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("Connection string missing scheme: {}", s))?;

        match scheme {
            "serial" => {
                let (port, baud) = rest
                    .rsplit_once(':')
                    .ok_or_else(|| anyhow!("Serial connection needs <port>:<baud>: {}", s))?;
                let baud = baud
                    .parse()
                    .with_context(|| format!("Invalid baud rate: {}", baud))?;
                Ok(Self::Serial {
                    port: port.to_string(),
                    baud,
                })
            }
            "udp" => Ok(Self::Udp {
                address: rest.to_string(),
            }),
            "tcp" => Ok(Self::Tcp {
                address: rest.to_string(),
            }),
            other => bail!("Unknown connection scheme: {}", other),
        }
    }
}

/// Configuration for flight controller connection
#[derive(Debug, Clone)]
pub struct FcConfig {
    /// Connection type and parameters
    pub connection: FcConnectionType,
    /// System ID for this control computer
    pub system_id: u8,
    /// Component ID for this control computer
    pub component_id: u8,
    /// Target system ID (flight controller)
    pub target_system: u8,
    /// Target component ID
    pub target_component: u8,
}

impl Default for FcConfig {
    fn default() -> Self {
        Self {
            connection: FcConnectionType::default(),
            system_id: link::SYSTEM_ID,
            component_id: link::COMPONENT_ID,
            target_system: link::TARGET_SYSTEM,
            target_component: link::TARGET_COMPONENT,
        }
    }
}

type SharedConnection = Arc<dyn MavConnection<MavMessage> + Send + Sync>;

/// Frame I/O over a live MAVLink connection
///
/// A reader thread owns the blocking receive side and hands decoded frames to
/// the control loop through a channel, so `try_receive` never blocks.
pub struct MavlinkLink {
    connection: SharedConnection,
    header: MavHeader,
    inbound_rx: mpsc::Receiver<MavMessage>,
    connected: Arc<AtomicBool>,
}

impl MavlinkLink {
    /// Open the connection described by `config` and start the reader thread
    pub fn connect(config: &FcConfig) -> Result<Self> {
        let address = config.connection.address();
        info!("[MAVLink] Connecting to flight controller at {}", address);

        let connection: SharedConnection = match mavlink::connect::<MavMessage>(&address) {
            Ok(conn) => Arc::from(conn),
            Err(e) => {
                if let FcConnectionType::Serial { .. } = config.connection {
                    log_available_ports();
                }
                return Err(e).with_context(|| format!("Failed to connect to {}", address));
            }
        };

        let (inbound_tx, inbound_rx) = mpsc::channel::<MavMessage>(INBOUND_CAPACITY);
        let connected = Arc::new(AtomicBool::new(true));

        let reader_conn = connection.clone();
        let reader_connected = connected.clone();
        std::thread::Builder::new()
            .name("mavlink-rx".into())
            .spawn(move || {
                reader_loop(|| reader_conn.recv(), inbound_tx, reader_connected)
            })
            .context("Failed to spawn MAVLink reader thread")?;

        info!("[MAVLink] Connected to flight controller");

        Ok(Self {
            connection,
            header: MavHeader {
                system_id: config.system_id,
                component_id: config.component_id,
                sequence: 0, // Will be set by connection
            },
            inbound_rx,
            connected,
        })
    }

    /// Check if the connection is still up
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl FrameIo for MavlinkLink {
    fn try_receive(&mut self) -> Option<MavMessage> {
        self.inbound_rx.try_recv().ok()
    }

    fn send(&mut self, frame: &MavMessage) -> Result<()> {
        if !self.is_connected() {
            bail!("Flight controller link is down");
        }

        self.connection
            .send(&self.header, frame)
            .map_err(|e| anyhow!("Send error: {}", e))?;
        Ok(())
    }
}

/// Blocking receive loop, runs on its own detached thread
///
/// Exits once the `MavlinkLink` is dropped, checked each time `recv` returns.
/// A blocking transport that never delivers another byte keeps the thread
/// parked in `recv` until process exit.
fn reader_loop<F>(
    mut recv: F,
    inbound_tx: mpsc::Sender<MavMessage>,
    connected: Arc<AtomicBool>,
) where
    F: FnMut() -> Result<(MavHeader, MavMessage), MessageReadError>,
{
    while !inbound_tx.is_closed() {
        match recv() {
            Ok((_header, msg)) => {
                if inbound_tx.blocking_send(msg).is_err() {
                    break;
                }
            }
            Err(MessageReadError::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                // No data available, continue
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(MessageReadError::Io(e)) => {
                error!("[MAVLink] Read error: {}", e);
                break;
            }
            Err(e) => {
                // Corrupt or unknown frames never reach the command layer
                debug!("[MAVLink] Dropping undecodable frame: {}", e);
            }
        }
    }

    if inbound_tx.is_closed() {
        debug!("[MAVLink] Frame consumer dropped, stopping reader");
    }
    connected.store(false, Ordering::SeqCst);
    warn!("[MAVLink] Disconnected from flight controller");
}

fn log_available_ports() {
    match tokio_serial::available_ports() {
        Ok(ports) if ports.is_empty() => warn!("[MAVLink] No serial ports found"),
        Ok(ports) => {
            for port in ports {
                info!("[MAVLink] Available serial port: {}", port.port_name);
            }
        }
        Err(e) => warn!("[MAVLink] Could not enumerate serial ports: {}", e),
    }
}
