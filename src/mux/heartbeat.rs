//! # Heartbeat Loop
//!
//! Every period: decay all TTL counters and send a status frame built from
//! the decayed values through the outbound queue, so status frames are
//! ordered with data frames by enqueue time.
//!
//! The heartbeat never waits on the queue. A status frame that finds it full
//! is dropped, and decay carries on at the next tick.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::queue::Outbound;
use super::stats::MuxStats;
use super::status::StatusTable;
use crate::frame::encoder::encode_status_frame;
use crate::frame::protocol::StatusSlots;
use crate::identity::RoverIdentity;

/// Periodic liveness pulse
pub struct Heartbeat {
    pub(crate) period: Duration,
    pub(crate) identity: RoverIdentity,
    pub(crate) status: StatusTable,
    pub(crate) outbound: Outbound,
    pub(crate) stats: Arc<MuxStats>,
    pub(crate) shutdown: CancellationToken,
}

impl Heartbeat {
    /// Pulse every period until shutdown; the first pulse comes one full
    /// period after start
    pub async fn run(self) {
        info!("Heartbeat started ({}s period)", self.period.as_secs_f32());

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Heartbeat stopping");
                    return;
                }
                _ = ticker.tick() => {}
            }
            self.pulse();
        }
    }

    /// One heartbeat: decay, encode, enqueue
    ///
    /// Returns the post-decay TTL values carried by the status frame.
    pub fn pulse(&self) -> StatusSlots {
        let ttl = self.status.decay_and_snapshot();
        let frame = encode_status_frame(&self.identity, &ttl);
        self.stats.record_status_frame();
        debug!("Status frame {:02X?}", frame.bytes.as_ref());

        if self.stats.uplink_failed() {
            warn!("Uplink is down; device TTL {:?} not transmitted", ttl);
        }

        self.outbound.try_enqueue_status(frame);
        ttl
    }
}
