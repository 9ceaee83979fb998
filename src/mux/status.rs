//! # Device Status Table
//!
//! Per-channel "time to live" counters. A reader sets its slot to
//! [`TTL_REFRESH`] whenever it produces data; every heartbeat decrements all
//! slots by one, floored at zero. A slot at zero means the channel has been
//! silent for at least `TTL_REFRESH` heartbeats.
//!
//! One mutex guards the whole table. It is tiny and touched a few times per
//! second, and never locked across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::frame::protocol::{DeviceChannel, StatusSlots, STATUS_SLOTS, TTL_REFRESH};

/// TTL counters plus a permanent-down flag per channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStatus {
    ttl: StatusSlots,
    down: [bool; STATUS_SLOTS],
}

impl DeviceStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the given TTL values and no channel marked down
    pub fn from_ttl(ttl: StatusSlots) -> Self {
        Self {
            ttl: ttl.map(|value| value.min(TTL_REFRESH)),
            down: [false; STATUS_SLOTS],
        }
    }

    /// Set a channel's TTL to `TTL_REFRESH`
    ///
    /// Returns `false` (and changes nothing) if the channel is down.
    pub fn refresh(&mut self, channel: DeviceChannel) -> bool {
        let slot = channel.slot();
        if self.down[slot] {
            return false;
        }
        self.ttl[slot] = TTL_REFRESH;
        true
    }

    /// Pin a channel to zero; later refreshes are ignored
    pub fn mark_down(&mut self, channel: DeviceChannel) {
        let slot = channel.slot();
        self.down[slot] = true;
        self.ttl[slot] = 0;
    }

    pub fn is_down(&self, channel: DeviceChannel) -> bool {
        self.down[channel.slot()]
    }

    /// One heartbeat: decrement every non-zero slot
    pub fn decay(&mut self) {
        for value in self.ttl.iter_mut() {
            *value = value.saturating_sub(1);
        }
    }

    pub fn get(&self, channel: DeviceChannel) -> u8 {
        self.ttl[channel.slot()]
    }

    /// TTL values for channels 1..=4
    pub fn ttl(&self) -> StatusSlots {
        self.ttl
    }
}

/// Shared handle to the status table
#[derive(Debug, Clone, Default)]
pub struct StatusTable {
    inner: Arc<Mutex<DeviceStatus>>,
}

impl StatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(status: DeviceStatus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(status)),
        }
    }

    /// Mark a channel alive; `false` if the channel is down
    pub fn refresh(&self, channel: DeviceChannel) -> bool {
        self.lock().refresh(channel)
    }

    pub fn mark_down(&self, channel: DeviceChannel) {
        self.lock().mark_down(channel);
    }

    pub fn is_down(&self, channel: DeviceChannel) -> bool {
        self.lock().is_down(channel)
    }

    /// Decrement all slots and return the post-decrement values
    ///
    /// Both steps happen under one lock, so no refresh can land between them.
    pub fn decay_and_snapshot(&self) -> StatusSlots {
        let mut status = self.lock();
        status.decay();
        status.ttl()
    }

    pub fn snapshot(&self) -> StatusSlots {
        self.lock().ttl()
    }

    fn lock(&self) -> MutexGuard<'_, DeviceStatus> {
        // The table holds plain counters; a panicked holder cannot leave it torn
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
