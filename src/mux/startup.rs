//! # Startup
//!
//! Opens the discovered devices and spawns one task per role. A device that
//! fails to open is logged and skipped; the rest still start. A radio that is
//! missing or fails to open puts the multiplexer in degraded mode, where
//! frames are still built and counted as lost.

use std::path::Path;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::{Multiplexer, ReaderExit};
use crate::config::Config;
use crate::error::Result;
use crate::frame::protocol::DeviceChannel;
use crate::serial::discovery::DiscoveredDevices;
use crate::serial::port_trait::SerialPortIO;

/// Ways a spawned task can end
#[derive(Debug)]
pub enum TaskExit {
    Reader(DeviceChannel, ReaderExit),
    Heartbeat,
    Uplink(Result<()>),
}

/// Tasks spawned by [`start`]
pub struct Started {
    pub tasks: JoinSet<TaskExit>,
    /// Channels whose reader is running
    pub channels: Vec<DeviceChannel>,
    /// Whether an uplink dispatcher is running
    pub uplink_connected: bool,
}

/// Open every discovered device with `open` and spawn its task
///
/// Spawns the uplink dispatcher (if the radio opens), one reader per sensor
/// that opens, and the heartbeat. Must be called inside a tokio runtime.
pub fn start<P, F>(
    mux: &mut Multiplexer,
    devices: &DiscoveredDevices,
    config: &Config,
    mut open: F,
) -> Started
where
    P: SerialPortIO + 'static,
    F: FnMut(&Path) -> Result<P>,
{
    let mut tasks = JoinSet::new();
    let mut uplink_connected = false;

    match &devices.uplink {
        Some(path) => match open(path.as_path()) {
            Ok(port) => {
                info!("Radio connected on {}", path.display());
                if let Some(dispatcher) = mux.uplink_dispatcher(port, &config.uplink) {
                    tasks.spawn(async move { TaskExit::Uplink(dispatcher.run().await) });
                    uplink_connected = true;
                }
            }
            Err(e) => {
                warn!("Radio not connected: {}", e);
                mux.disable_uplink();
            }
        },
        None => {
            info!("Radio not connected.");
            mux.disable_uplink();
        }
    }

    match devices.correction_sink() {
        Some(sink) => info!(
            "GNSS corrections device on {} (channel {})",
            sink.path.display(),
            sink.channel
        ),
        None => info!("GNSS corrections device not found."),
    }

    let mut channels = Vec::new();
    for sensor in &devices.sensors {
        match open(sensor.path.as_path()) {
            Ok(port) => {
                info!("Channel {}: {}", sensor.channel, sensor.path.display());
                let reader = mux.device_reader(sensor.channel, port, config.serial.read_chunk_bytes);
                let channel = sensor.channel;
                tasks.spawn(async move { TaskExit::Reader(channel, reader.run().await) });
                channels.push(channel);
            }
            Err(e) => warn!("Channel {} unavailable: {}", sensor.channel, e),
        }
    }
    info!(
        "{} device{} connected.",
        channels.len(),
        if channels.len() == 1 { "" } else { "s" }
    );

    let heartbeat = mux.heartbeat();
    tasks.spawn(async move {
        heartbeat.run().await;
        TaskExit::Heartbeat
    });

    Started {
        tasks,
        channels,
        uplink_connected,
    }
}
