//! Multiplexer counters shared by every task

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Live counters, updated lock-free by readers, heartbeat and uplink
#[derive(Debug, Default)]
pub struct MuxStats {
    frames_enqueued: AtomicU64,
    frames_sent: AtomicU64,
    frames_lost: AtomicU64,
    queue_full_events: AtomicU64,
    status_frames: AtomicU64,
    status_dropped: AtomicU64,
    uplink_failed: AtomicBool,
}

/// Point-in-time copy of [`MuxStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames accepted by the outbound queue
    pub frames_enqueued: u64,
    /// Frames fully written to the radio
    pub frames_sent: u64,
    /// Frames dropped (queue closed or full for status, shutdown, uplink failure)
    pub frames_lost: u64,
    /// Times a producer found the queue full and had to wait
    pub queue_full_events: u64,
    /// Status frames built by the heartbeat
    pub status_frames: u64,
    /// Status frames dropped because the queue was full
    pub status_dropped: u64,
    /// The uplink dispatcher gave up
    pub uplink_failed: bool,
}

impl MuxStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_enqueued: self.frames_enqueued.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_lost: self.frames_lost.load(Ordering::Relaxed),
            queue_full_events: self.queue_full_events.load(Ordering::Relaxed),
            status_frames: self.status_frames.load(Ordering::Relaxed),
            status_dropped: self.status_dropped.load(Ordering::Relaxed),
            uplink_failed: self.uplink_failed.load(Ordering::Relaxed),
        }
    }

    pub fn uplink_failed(&self) -> bool {
        self.uplink_failed.load(Ordering::Relaxed)
    }

    pub(crate) fn record_enqueued(&self) {
        self.frames_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lost(&self, count: u64) {
        self.frames_lost.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_queue_full(&self) {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_status_frame(&self) {
        self.status_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_status_dropped(&self) {
        self.status_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_uplink_failed(&self) {
        self.uplink_failed.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = MuxStats::new();
        stats.record_enqueued();
        stats.record_enqueued();
        stats.record_sent();
        stats.record_lost(3);
        stats.record_queue_full();
        stats.record_status_frame();
        stats.record_status_dropped();

        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                frames_enqueued: 2,
                frames_sent: 1,
                frames_lost: 3,
                queue_full_events: 1,
                status_frames: 1,
                status_dropped: 1,
                uplink_failed: false,
            }
        );

        stats.set_uplink_failed();
        assert!(stats.uplink_failed());
        assert!(stats.snapshot().uplink_failed);
    }
}
