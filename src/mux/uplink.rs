//! # Uplink Dispatcher
//!
//! Drains the outbound queue to the radio link, one whole frame per write.
//!
//! A failed write is retried up to `write_retries` times. When retries are
//! exhausted the uplink is considered lost: the frame and everything still
//! queued are counted as lost, the queue is closed so producers stop
//! waiting, and the dispatcher returns an error.

use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::queue::OutboundReceiver;
use super::stats::MuxStats;
use crate::config::UplinkConfig;
use crate::error::{Result, RoverMuxError};
use crate::frame::protocol::EncodedFrame;
use crate::serial::port_trait::SerialPortIO;

/// Single consumer of the outbound queue
pub struct UplinkDispatcher<P> {
    pub(crate) port: P,
    pub(crate) rx: OutboundReceiver,
    pub(crate) write_retries: u32,
    pub(crate) retry_delay: Duration,
    pub(crate) stats: Arc<MuxStats>,
    pub(crate) shutdown: CancellationToken,
}

impl<P: SerialPortIO> UplinkDispatcher<P> {
    pub(crate) fn new(
        port: P,
        rx: OutboundReceiver,
        config: &UplinkConfig,
        stats: Arc<MuxStats>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            port,
            rx,
            write_retries: config.write_retries,
            retry_delay: config.retry_delay(),
            stats,
            shutdown,
        }
    }

    /// Transmit frames in queue order until shutdown or uplink failure
    ///
    /// On shutdown the queue is closed and frames already queued are still
    /// written before returning.
    ///
    /// # Errors
    ///
    /// Returns `UplinkFailed` when a frame cannot be written
    pub async fn run(mut self) -> Result<()> {
        info!("Uplink dispatcher started");

        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                frame = self.rx.recv() => frame,
            };

            match next {
                Some(frame) => self.transmit(frame).await?,
                None => {
                    info!("All producers gone, uplink dispatcher stopping");
                    return Ok(());
                }
            }
        }

        self.rx.close();
        let mut flushed = 0usize;
        while let Some(frame) = self.rx.recv().await {
            self.transmit(frame).await?;
            flushed += 1;
        }
        info!("Uplink dispatcher stopped ({} queued frames flushed)", flushed);
        Ok(())
    }

    async fn transmit(&mut self, frame: EncodedFrame) -> Result<()> {
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.write_frame(&frame).await {
                Ok(()) => {
                    self.stats.record_sent();
                    debug!("Uplinked {:?} frame ({} bytes)", frame.kind, frame.len());
                    return Ok(());
                }
                Err(e) if attempts <= self.write_retries => {
                    warn!("Uplink write failed (attempt {}), retrying: {}", attempts, e);
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    self.fail();
                    error!("Uplink write failed after {} attempt(s), uplink stopped: {}", attempts, e);
                    return Err(RoverMuxError::UplinkFailed { attempts, source: e });
                }
            }
        }
    }

    async fn write_frame(&mut self, frame: &EncodedFrame) -> io::Result<()> {
        self.port.write_all(&frame.bytes).await?;
        self.port.flush().await
    }

    /// Count the failed frame and anything still queued as lost
    fn fail(&mut self) {
        self.stats.set_uplink_failed();
        self.rx.close();

        let mut lost = 1u64;
        while self.rx.try_recv().is_ok() {
            lost += 1;
        }
        self.stats.record_lost(lost);
    }
}
