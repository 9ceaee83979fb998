//! # Device Reader
//!
//! One task per peripheral: read a chunk, mark the channel alive, frame the
//! bytes and queue them for the uplink.

use std::io;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::queue::Outbound;
use super::status::StatusTable;
use crate::frame::encoder::encode_data_frame;
use crate::frame::protocol::DeviceChannel;
use crate::identity::RoverIdentity;
use crate::serial::port_trait::{is_transient, SerialPortIO};

/// Why a reader stopped
#[derive(Debug)]
pub enum ReaderExit {
    /// Shutdown was requested
    Shutdown,
    /// The device failed; its channel is now marked down
    DeviceError(io::Error),
}

/// Reader loop for a single device
pub struct DeviceReader<P> {
    pub(crate) channel: DeviceChannel,
    pub(crate) port: P,
    pub(crate) chunk_bytes: usize,
    pub(crate) identity: RoverIdentity,
    pub(crate) status: StatusTable,
    pub(crate) outbound: Outbound,
    pub(crate) shutdown: CancellationToken,
}

impl<P: SerialPortIO> DeviceReader<P> {
    /// Run until shutdown or a device error
    ///
    /// Empty reads (timeouts) just loop. Any non-transient read error ends
    /// the loop and pins the channel's TTL to zero.
    pub async fn run(mut self) -> ReaderExit {
        info!("Reader started on channel {}", self.channel);
        let mut buf = vec![0u8; self.chunk_bytes];

        loop {
            let read = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Reader on channel {} stopping", self.channel);
                    return ReaderExit::Shutdown;
                }
                result = self.port.read_chunk(&mut buf) => result,
            };

            match read {
                Ok(0) => continue,
                Ok(n) => {
                    self.status.refresh(self.channel);
                    let frame = encode_data_frame(&self.identity, self.channel, &buf[..n]);
                    debug!("Channel {}: read {} bytes, queued {}-byte frame", self.channel, n, frame.len());
                    if !self.outbound.enqueue(frame).await {
                        debug!("Channel {}: frame dropped, not queued", self.channel);
                    }
                }
                Err(e) if is_transient(e.kind()) => continue,
                Err(e) => {
                    error!("Channel {} device error, reader stopped: {}", self.channel, e);
                    self.status.mark_down(self.channel);
                    return ReaderExit::DeviceError(e);
                }
            }
        }
    }
}
