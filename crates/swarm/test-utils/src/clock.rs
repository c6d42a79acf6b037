use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use vertex_swarm_bandwidth_chequebook::Clock;

/// 2024-01-01T00:00:00Z.
pub const TEST_EPOCH: u64 = 1_704_067_200;

/// A [`Clock`] that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicU64,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(TEST_EPOCH)
    }
}

impl ManualClock {
    pub const fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_secs(), Ordering::SeqCst);
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
