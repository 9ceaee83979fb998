//! # Multiplexer Module
//!
//! Turns N device byte streams into one ordered frame stream on the radio.
//!
//! A [`Multiplexer`] owns the shared state (outbound queue, device status
//! table, counters, shutdown token) and hands it to each task it builds:
//! - one [`DeviceReader`] per peripheral
//! - one [`Heartbeat`]
//! - at most one [`UplinkDispatcher`]
//!
//! Status frames go through the same queue as data frames. [`start`] opens
//! the discovered devices and spawns the tasks.

pub mod heartbeat;
pub mod queue;
pub mod reader;
pub mod startup;
pub mod stats;
pub mod status;
pub mod uplink;

pub use heartbeat::Heartbeat;
pub use queue::{Outbound, OutboundReceiver};
pub use reader::{DeviceReader, ReaderExit};
pub use startup::{start, Started, TaskExit};
pub use stats::{MuxStats, StatsSnapshot};
pub use status::{DeviceStatus, StatusTable};
pub use uplink::UplinkDispatcher;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{MuxConfig, UplinkConfig};
use crate::frame::protocol::DeviceChannel;
use crate::identity::RoverIdentity;
use crate::serial::port_trait::SerialPortIO;

/// Shared multiplexer context
pub struct Multiplexer {
    identity: RoverIdentity,
    heartbeat_period: Duration,
    status: StatusTable,
    stats: Arc<MuxStats>,
    outbound: Outbound,
    receiver: Option<OutboundReceiver>,
    shutdown: CancellationToken,
}

impl Multiplexer {
    /// Create a multiplexer with all channels at TTL 0
    pub fn new(identity: RoverIdentity, config: &MuxConfig) -> Self {
        Self::with_status(identity, config, DeviceStatus::new())
    }

    /// Create a multiplexer with a given initial status table
    pub fn with_status(identity: RoverIdentity, config: &MuxConfig, status: DeviceStatus) -> Self {
        let stats = Arc::new(MuxStats::new());
        let shutdown = CancellationToken::new();
        let (outbound, receiver) =
            queue::outbound_queue(config.queue_capacity, stats.clone(), shutdown.clone());

        Self {
            identity,
            heartbeat_period: config.heartbeat_period(),
            status: StatusTable::with_status(status),
            stats,
            outbound,
            receiver: Some(receiver),
            shutdown,
        }
    }

    pub fn status(&self) -> &StatusTable {
        &self.status
    }

    /// Producer handle onto the outbound queue
    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Ask every task to stop
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Build the reader task for one device
    pub fn device_reader<P: SerialPortIO>(
        &self,
        channel: DeviceChannel,
        port: P,
        chunk_bytes: usize,
    ) -> DeviceReader<P> {
        DeviceReader {
            channel,
            port,
            chunk_bytes,
            identity: self.identity.clone(),
            status: self.status.clone(),
            outbound: self.outbound.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Build the heartbeat task
    pub fn heartbeat(&self) -> Heartbeat {
        Heartbeat {
            period: self.heartbeat_period,
            identity: self.identity.clone(),
            status: self.status.clone(),
            outbound: self.outbound.clone(),
            stats: self.stats.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Build the uplink dispatcher; `None` if it was already built
    pub fn uplink_dispatcher<P: SerialPortIO>(
        &mut self,
        port: P,
        config: &UplinkConfig,
    ) -> Option<UplinkDispatcher<P>> {
        let rx = self.receiver.take()?;
        Some(UplinkDispatcher::new(
            port,
            rx,
            config,
            self.stats.clone(),
            self.shutdown.clone(),
        ))
    }

    /// Run without a radio: frames are built but dropped and counted
    pub fn disable_uplink(&mut self) {
        if self.receiver.take().is_some() {
            info!("Uplink disabled; frames will be counted as lost");
        }
    }

    /// Take the raw receiving end of the queue
    pub fn take_receiver(&mut self) -> Option<OutboundReceiver> {
        self.receiver.take()
    }
}
