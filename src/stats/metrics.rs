//! Counters for ingest and status fan-out activity

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free counters shared by the ingest adapter and the broadcaster
#[derive(Debug, Default)]
pub struct LiveStats {
    publishes_accepted: AtomicU64,
    publishes_rejected: AtomicU64,
    chunks_stored: AtomicU64,
    chunk_bytes: AtomicU64,
    storage_failures: AtomicU64,
    snapshots_sent: AtomicU64,
    subscribers_dropped: AtomicU64,
}

impl LiveStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_publish_accepted(&self) {
        self.publishes_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_rejected(&self) {
        self.publishes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chunk(&self, bytes: u64) {
        self.chunks_stored.fetch_add(1, Ordering::Relaxed);
        self.chunk_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_storage_failure(&self) {
        self.storage_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshots_sent(&self, n: u64) {
        self.snapshots_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_subscribers_dropped(&self, n: u64) {
        self.subscribers_dropped.fetch_add(n, Ordering::Relaxed);
    }

    /// Read all counters into a plain snapshot
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            publishes_accepted: self.publishes_accepted.load(Ordering::Relaxed),
            publishes_rejected: self.publishes_rejected.load(Ordering::Relaxed),
            chunks_stored: self.chunks_stored.load(Ordering::Relaxed),
            chunk_bytes: self.chunk_bytes.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            snapshots_sent: self.snapshots_sent.load(Ordering::Relaxed),
            subscribers_dropped: self.subscribers_dropped.load(Ordering::Relaxed),
            live_streams: 0,
            subscribers: 0,
        }
    }
}

/// Point-in-time copy of the counters plus current gauges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub publishes_accepted: u64,
    pub publishes_rejected: u64,
    pub chunks_stored: u64,
    pub chunk_bytes: u64,
    pub storage_failures: u64,
    pub snapshots_sent: u64,
    pub subscribers_dropped: u64,
    /// Sessions currently in the registry
    pub live_streams: u64,
    /// Open status subscriptions
    pub subscribers: u64,
}
