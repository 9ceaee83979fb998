//! # Outbound Queue
//!
//! Bounded FIFO of encoded frames between the producers (device readers and
//! the heartbeat) and the single uplink dispatcher.
//!
//! Full-queue policy: a device reader waits until the dispatcher frees a
//! slot, so nothing is dropped while a dispatcher is running. Each wait is
//! counted in `queue_full_events`. A wait ends early on shutdown, dropping the
//! frame. Status frames never wait: when the queue is full the frame is
//! dropped and counted in `status_dropped`, and the heartbeat keeps ticking.
//! Once the receiving side is gone (no radio, uplink failure) frames are
//! dropped. Every dropped frame is counted in `frames_lost`.

use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::stats::MuxStats;
use crate::frame::protocol::EncodedFrame;

/// Receiving end, owned by the uplink dispatcher
pub type OutboundReceiver = mpsc::Receiver<EncodedFrame>;

/// Producer handle; cheap to clone, one per task
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::Sender<EncodedFrame>,
    stats: Arc<MuxStats>,
    shutdown: CancellationToken,
}

/// Create a queue holding at most `capacity` frames
///
/// Producers parked on a full queue give up once `shutdown` is cancelled.
pub fn outbound_queue(
    capacity: usize,
    stats: Arc<MuxStats>,
    shutdown: CancellationToken,
) -> (Outbound, OutboundReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (Outbound { tx, stats, shutdown }, rx)
}

impl Outbound {
    /// Push a frame, waiting while the queue is full
    ///
    /// Returns `false` if the frame was dropped because nothing is receiving
    /// or shutdown was requested while waiting.
    pub async fn enqueue(&self, frame: EncodedFrame) -> bool {
        let frame = match self.tx.try_send(frame) {
            Ok(()) => {
                self.stats.record_enqueued();
                return true;
            }
            Err(TrySendError::Full(frame)) => {
                self.stats.record_queue_full();
                debug!("Outbound queue full, waiting for uplink");
                frame
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.record_lost(1);
                trace!("Outbound queue closed, frame dropped");
                return false;
            }
        };

        tokio::select! {
            result = self.tx.send(frame) => match result {
                Ok(()) => {
                    self.stats.record_enqueued();
                    true
                }
                Err(_) => {
                    self.stats.record_lost(1);
                    false
                }
            },
            _ = self.shutdown.cancelled() => {
                self.stats.record_lost(1);
                debug!("Shutdown while waiting on full queue, frame dropped");
                false
            }
        }
    }

    /// Push a status frame without waiting
    ///
    /// A full queue drops the frame; returns `false` if it was not queued.
    pub fn try_enqueue_status(&self, frame: EncodedFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => {
                self.stats.record_enqueued();
                true
            }
            Err(TrySendError::Full(_)) => {
                self.stats.record_status_dropped();
                self.stats.record_lost(1);
                debug!("Outbound queue full, status frame dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.record_lost(1);
                trace!("Outbound queue closed, status frame dropped");
                false
            }
        }
    }

    /// Whether the receiving side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encoder::encode_data_frame;
    use crate::frame::protocol::DeviceChannel;
    use crate::identity::RoverIdentity;
    use std::time::Duration;

    fn frame(byte: u8) -> EncodedFrame {
        encode_data_frame(&RoverIdentity::new("1234"), DeviceChannel::new(1).unwrap(), &[byte])
    }

    #[tokio::test]
    async fn test_enqueue_is_fifo() {
        let stats = Arc::new(MuxStats::new());
        let (outbound, mut rx) = outbound_queue(8, stats.clone(), CancellationToken::new());

        for byte in 0..5 {
            assert!(outbound.enqueue(frame(byte)).await);
        }
        for byte in 0..5 {
            assert_eq!(rx.recv().await.unwrap(), frame(byte));
        }
        assert_eq!(stats.snapshot().frames_enqueued, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_blocks_producer_without_loss() {
        let stats = Arc::new(MuxStats::new());
        let (outbound, mut rx) = outbound_queue(1, stats.clone(), CancellationToken::new());

        assert!(outbound.enqueue(frame(1)).await);

        let producer = {
            let outbound = outbound.clone();
            tokio::spawn(async move { outbound.enqueue(frame(2)).await })
        };

        // The producer is parked on the full queue
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!producer.is_finished());
        assert_eq!(stats.snapshot().queue_full_events, 1);

        // Consuming one frame lets it proceed
        assert_eq!(rx.recv().await.unwrap(), frame(1));
        assert!(producer.await.unwrap());
        assert_eq!(rx.recv().await.unwrap(), frame(2));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_enqueued, 2);
        assert_eq!(snapshot.frames_lost, 0);
    }

    #[tokio::test]
    async fn test_closed_queue_counts_loss() {
        let stats = Arc::new(MuxStats::new());
        let (outbound, rx) = outbound_queue(4, stats.clone(), CancellationToken::new());
        drop(rx);

        assert!(outbound.is_closed());
        assert!(!outbound.enqueue(frame(1)).await);
        assert_eq!(stats.snapshot().frames_lost, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_producer_released_when_receiver_closes() {
        let stats = Arc::new(MuxStats::new());
        let (outbound, mut rx) = outbound_queue(1, stats.clone(), CancellationToken::new());
        assert!(outbound.enqueue(frame(1)).await);

        let producer = {
            let outbound = outbound.clone();
            tokio::spawn(async move { outbound.enqueue(frame(2)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        rx.close();
        assert!(!producer.await.unwrap());
        assert_eq!(stats.snapshot().frames_lost, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_waiting_producer() {
        let stats = Arc::new(MuxStats::new());
        let shutdown = CancellationToken::new();
        let (outbound, _rx) = outbound_queue(1, stats.clone(), shutdown.clone());
        assert!(outbound.enqueue(frame(1)).await);

        let producer = {
            let outbound = outbound.clone();
            tokio::spawn(async move { outbound.enqueue(frame(2)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!producer.is_finished());

        // The receiver is still alive; only the token frees the producer
        shutdown.cancel();
        let queued = tokio::time::timeout(Duration::from_secs(1), producer)
            .await
            .expect("producer should give up on shutdown")
            .unwrap();
        assert!(!queued);
        assert_eq!(stats.snapshot().frames_lost, 1);
    }

    #[tokio::test]
    async fn test_status_frame_dropped_when_full() {
        let stats = Arc::new(MuxStats::new());
        let (outbound, mut rx) = outbound_queue(1, stats.clone(), CancellationToken::new());

        assert!(outbound.try_enqueue_status(frame(1)));
        assert!(!outbound.try_enqueue_status(frame(2)));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_enqueued, 1);
        assert_eq!(snapshot.status_dropped, 1);
        assert_eq!(snapshot.frames_lost, 1);
        assert_eq!(rx.recv().await.unwrap(), frame(1));

        // Room again
        assert!(outbound.try_enqueue_status(frame(3)));
    }
}
