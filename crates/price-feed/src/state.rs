//! Shared consensus state
//!
//! A single snapshot behind a read-write lock. The poller is the only writer;
//! any number of readers get clones, so a later publish never changes what a
//! reader already holds.

use chrono::Utc;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use oracle_core::{ConsensusSnapshot, DEFAULT_CURRENCY};

/// Holder of the latest published snapshot
#[derive(Debug)]
pub struct PriceState {
    snapshot: RwLock<ConsensusSnapshot>,
    publish_count: AtomicU64,
}

impl PriceState {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            snapshot: RwLock::new(ConsensusSnapshot::initial(currency)),
            publish_count: AtomicU64::new(0),
        }
    }

    /// Replace the stored snapshot wholesale
    pub fn publish(&self, snapshot: ConsensusSnapshot) {
        *self.snapshot.write() = snapshot;
        self.publish_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Publish the stale successor of the current snapshot.
    ///
    /// Read and replace happen under one write guard so no other publish can
    /// slip in between.
    pub fn publish_stale(&self) -> ConsensusSnapshot {
        let mut guard = self.snapshot.write();
        let stale = guard.clone().into_stale();
        *guard = stale.clone();
        drop(guard);

        self.publish_count.fetch_add(1, Ordering::Relaxed);
        stale
    }

    /// Copy of the current snapshot
    pub fn read(&self) -> ConsensusSnapshot {
        self.snapshot.read().clone()
    }

    pub fn is_stale(&self) -> bool {
        self.snapshot.read().stale
    }

    pub fn stats(&self) -> PriceStateStats {
        let snapshot = self.read();

        PriceStateStats {
            publish_count: self.publish_count.load(Ordering::Relaxed),
            stale: snapshot.stale,
            sources_used: snapshot.sources_used,
            last_update_age: snapshot.age(Utc::now()),
        }
    }
}

impl Default for PriceState {
    fn default() -> Self {
        Self::new(DEFAULT_CURRENCY)
    }
}

/// Statistics about price state
#[derive(Debug, Clone)]
pub struct PriceStateStats {
    pub publish_count: u64,
    pub stale: bool,
    pub sources_used: usize,
    pub last_update_age: Option<Duration>,
}
