//! Status broadcaster
//!
//! Keeps the set of status subscribers per stream key and pushes snapshots
//! built from the registry: once when a subscriber joins, then on every tick
//! while the stream is live.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::registry::{StreamKey, StreamRegistry};
use crate::stats::LiveStats;

use super::config::BroadcastConfig;
use super::snapshot::StatusSnapshot;
use super::subscriber::{Delivery, SubscriberHandle, SubscriberId};

/// Outcome of one broadcast tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Live streams that had at least one subscriber
    pub streams: usize,
    /// Snapshots queued
    pub delivered: usize,
    /// Snapshots skipped for lagging subscribers
    pub lagged: usize,
    /// Subscribers removed because their connection was closed
    pub dropped: usize,
}

/// Fans status snapshots out to subscribers
///
/// Subscriber sets live in a sharded map so connects and disconnects on
/// different keys do not contend. Delivery always works on a copy of a set,
/// so changes during a tick never race with the send loop.
pub struct StatusBroadcaster {
    registry: Arc<StreamRegistry>,
    subscribers: DashMap<StreamKey, HashMap<SubscriberId, SubscriberHandle>>,
    config: BroadcastConfig,
    next_id: AtomicU64,
    stats: Arc<LiveStats>,
}

impl StatusBroadcaster {
    /// Create a broadcaster with default configuration
    pub fn new(registry: Arc<StreamRegistry>) -> Self {
        Self::with_config(registry, BroadcastConfig::default(), Arc::new(LiveStats::new()))
    }

    /// Create a broadcaster with custom configuration and shared stats
    pub fn with_config(
        registry: Arc<StreamRegistry>,
        config: BroadcastConfig,
        stats: Arc<LiveStats>,
    ) -> Self {
        Self {
            registry,
            subscribers: DashMap::new(),
            config,
            next_id: AtomicU64::new(1),
            stats,
        }
    }

    /// Get the broadcaster configuration
    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// Allocate a handle and its receiving queue for a new connection
    pub fn new_handle(&self) -> (SubscriberHandle, mpsc::Receiver<StatusSnapshot>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        SubscriberHandle::channel(id, self.config.subscriber_buffer)
    }

    /// Current status of a raw key, live or not
    pub async fn snapshot_for(&self, raw_key: &str) -> StatusSnapshot {
        let session = self.registry.get_raw(raw_key).await;
        StatusSnapshot::for_session(session.as_ref(), Utc::now())
    }

    /// Add `handle` to `key`'s subscribers and send it the current status
    ///
    /// A key with no session gets an explicit not-live snapshot.
    pub async fn subscribe(&self, key: &StreamKey, handle: SubscriberHandle) {
        let id = handle.id();
        self.subscribers
            .entry(key.clone())
            .or_default()
            .insert(id, handle.clone());

        let session = self.registry.get(key).await;
        let snapshot = StatusSnapshot::for_session(session.as_ref(), Utc::now());

        tracing::debug!(
            stream = %key,
            subscriber = id,
            live = snapshot.is_live,
            "Subscriber added"
        );

        match handle.deliver(snapshot) {
            Delivery::Sent => self.stats.record_snapshots_sent(1),
            Delivery::Lagged => {}
            Delivery::Closed => {
                self.unsubscribe(key, id);
                self.stats.record_subscribers_dropped(1);
            }
        }
    }

    /// Remove a subscriber
    ///
    /// The key's entry is dropped once its set is empty. Returns whether the
    /// subscriber was present.
    pub fn unsubscribe(&self, key: &StreamKey, id: SubscriberId) -> bool {
        let removed = self
            .subscribers
            .get_mut(key)
            .map(|mut set| set.remove(&id).is_some())
            .unwrap_or(false);

        self.subscribers.remove_if(key, |_, set| set.is_empty());

        if removed {
            tracing::debug!(stream = %key, subscriber = id, "Subscriber removed");
        }
        removed
    }

    /// Number of subscribers for `key`
    pub fn subscriber_count(&self, key: &StreamKey) -> usize {
        self.subscribers.get(key).map(|set| set.len()).unwrap_or(0)
    }

    /// Number of subscribers across all keys
    pub fn total_subscribers(&self) -> usize {
        self.subscribers.iter().map(|set| set.len()).sum()
    }

    /// Number of keys with at least one subscriber
    pub fn subscribed_keys(&self) -> usize {
        self.subscribers.len()
    }

    /// Push a snapshot to every subscriber of every live stream
    ///
    /// A closed connection is unsubscribed and delivery carries on with the
    /// rest of the set.
    pub async fn tick(&self) -> TickReport {
        let sessions = self.registry.list().await;
        let now = Utc::now();
        let mut report = TickReport::default();

        for session in sessions.iter().filter(|s| s.is_live) {
            let key = &session.stream_key;
            let targets: Vec<SubscriberHandle> = match self.subscribers.get(key) {
                Some(set) => set.values().cloned().collect(),
                None => continue,
            };
            if targets.is_empty() {
                continue;
            }

            report.streams += 1;
            let snapshot = StatusSnapshot::from_session(session, now);

            for handle in targets {
                match handle.deliver(snapshot.clone()) {
                    Delivery::Sent => report.delivered += 1,
                    Delivery::Lagged => {
                        report.lagged += 1;
                        tracing::debug!(
                            stream = %key,
                            subscriber = handle.id(),
                            "Subscriber lagging, snapshot skipped"
                        );
                    }
                    Delivery::Closed => {
                        self.unsubscribe(key, handle.id());
                        report.dropped += 1;
                    }
                }
            }
        }

        self.stats.record_snapshots_sent(report.delivered as u64);
        self.stats.record_subscribers_dropped(report.dropped as u64);

        if report.dropped > 0 {
            tracing::debug!(dropped = report.dropped, "Removed closed subscribers");
        }
        tracing::trace!(
            streams = report.streams,
            delivered = report.delivered,
            lagged = report.lagged,
            "Broadcast tick"
        );

        report
    }

    /// Spawn the periodic broadcast task
    ///
    /// The task stops when `cancel` fires.
    pub fn spawn_ticker(self: &Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let broadcaster = Arc::clone(self);
        let interval = broadcaster.config.tick_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; subscribers already got a snapshot
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        broadcaster.tick().await;
                    }
                }
            }
            tracing::debug!("Status ticker stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::registry::SessionPatch;

    fn setup() -> (Arc<StreamRegistry>, StatusBroadcaster) {
        let registry = Arc::new(StreamRegistry::new());
        let broadcaster = StatusBroadcaster::new(Arc::clone(&registry));
        (registry, broadcaster)
    }

    fn key() -> StreamKey {
        StreamKey::parse("nf_ab12345678").unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_offline_key_gets_not_live() {
        let (_registry, broadcaster) = setup();
        let (handle, mut rx) = broadcaster.new_handle();

        broadcaster.subscribe(&key(), handle).await;

        let snapshot = rx.try_recv().unwrap();
        assert!(!snapshot.is_live);
        assert_eq!(snapshot.viewer_count, 0);
        assert_eq!(snapshot.duration_seconds, 0);
        assert_eq!(snapshot.bitrate, 0);
        assert_eq!(snapshot.resolution, "");
        assert_eq!(broadcaster.subscriber_count(&key()), 1);
    }

    #[tokio::test]
    async fn test_subscribe_live_key_gets_live_snapshot() {
        let (registry, broadcaster) = setup();
        registry.create(&key()).await;
        registry.increment_viewer(&key()).await;

        let (handle, mut rx) = broadcaster.new_handle();
        broadcaster.subscribe(&key(), handle).await;

        let snapshot = rx.try_recv().unwrap();
        assert!(snapshot.is_live);
        assert_eq!(snapshot.viewer_count, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_drops_empty_set() {
        let (_registry, broadcaster) = setup();
        let (a, _rx_a) = broadcaster.new_handle();
        let (b, _rx_b) = broadcaster.new_handle();
        let (a_id, b_id) = (a.id(), b.id());

        broadcaster.subscribe(&key(), a).await;
        broadcaster.subscribe(&key(), b).await;
        assert_eq!(broadcaster.subscriber_count(&key()), 2);

        assert!(broadcaster.unsubscribe(&key(), a_id));
        assert_eq!(broadcaster.subscribed_keys(), 1);

        assert!(broadcaster.unsubscribe(&key(), b_id));
        assert_eq!(broadcaster.subscribed_keys(), 0);

        // Unknown id is a no-op
        assert!(!broadcaster.unsubscribe(&key(), b_id));
    }

    #[tokio::test]
    async fn test_tick_delivers_to_all_and_drops_closed() {
        let (registry, broadcaster) = setup();
        registry.create(&key()).await;

        let (a, mut rx_a) = broadcaster.new_handle();
        let (b, rx_b) = broadcaster.new_handle();
        let (c, mut rx_c) = broadcaster.new_handle();
        broadcaster.subscribe(&key(), a).await;
        broadcaster.subscribe(&key(), b).await;
        broadcaster.subscribe(&key(), c).await;

        // Drain the subscribe snapshots
        rx_a.try_recv().unwrap();
        rx_c.try_recv().unwrap();

        // Middle connection breaks
        drop(rx_b);
        registry.increment_viewer(&key()).await;

        let report = broadcaster.tick().await;

        assert_eq!(report.delivered, 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(broadcaster.subscriber_count(&key()), 2);
        assert_eq!(rx_a.try_recv().unwrap().viewer_count, 1);
        assert_eq!(rx_c.try_recv().unwrap().viewer_count, 1);
    }

    #[tokio::test]
    async fn test_tick_skips_lagging_subscriber() {
        let registry = Arc::new(StreamRegistry::new());
        let broadcaster = StatusBroadcaster::with_config(
            Arc::clone(&registry),
            BroadcastConfig::default().subscriber_buffer(1),
            Arc::new(LiveStats::new()),
        );
        registry.create(&key()).await;

        // Subscribe snapshot fills the single slot
        let (handle, mut rx) = broadcaster.new_handle();
        broadcaster.subscribe(&key(), handle).await;

        let report = broadcaster.tick().await;
        assert_eq!(report.lagged, 1);
        assert_eq!(report.dropped, 0);
        assert_eq!(broadcaster.subscriber_count(&key()), 1);

        rx.try_recv().unwrap();
        let report = broadcaster.tick().await;
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    async fn test_tick_ignores_removed_streams() {
        let (registry, broadcaster) = setup();
        registry.create(&key()).await;

        let (handle, mut rx) = broadcaster.new_handle();
        broadcaster.subscribe(&key(), handle).await;
        rx.try_recv().unwrap();

        registry.remove(&key()).await;
        let report = broadcaster.tick().await;

        assert_eq!(report, TickReport::default());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_tick_uses_registry_values() {
        let (registry, broadcaster) = setup();
        registry.create(&key()).await;
        registry
            .touch(&key(), SessionPatch::new().resolution("1280x720"))
            .await;
        for _ in 0..3 {
            registry.increment_viewer(&key()).await;
        }

        let (handle, mut rx) = broadcaster.new_handle();
        broadcaster.subscribe(&key(), handle).await;
        rx.try_recv().unwrap();

        broadcaster.tick().await;
        let snapshot = rx.try_recv().unwrap();
        assert_eq!(snapshot.viewer_count, 3);
        assert_eq!(snapshot.resolution, "1280x720");

        // Same count on every tick
        broadcaster.tick().await;
        assert_eq!(rx.try_recv().unwrap().viewer_count, 3);
    }

    #[tokio::test]
    async fn test_subscribe_with_closed_handle_is_removed() {
        let (_registry, broadcaster) = setup();
        let (handle, rx) = broadcaster.new_handle();
        drop(rx);

        broadcaster.subscribe(&key(), handle).await;
        assert_eq!(broadcaster.subscriber_count(&key()), 0);
    }

    #[tokio::test]
    async fn test_ticker_pushes_periodically() {
        tokio::time::pause();
        let registry = Arc::new(StreamRegistry::new());
        let broadcaster = Arc::new(StatusBroadcaster::with_config(
            Arc::clone(&registry),
            BroadcastConfig::default().tick_interval(Duration::from_secs(5)),
            Arc::new(LiveStats::new()),
        ));
        registry.create(&key()).await;

        let (handle, mut rx) = broadcaster.new_handle();
        broadcaster.subscribe(&key(), handle).await;
        rx.recv().await.unwrap();

        let cancel = CancellationToken::new();
        let task = broadcaster.spawn_ticker(cancel.clone());

        let snapshot = tokio::time::timeout(Duration::from_secs(6), rx.recv())
            .await
            .expect("no tick within interval")
            .unwrap();
        assert!(snapshot.is_live);

        cancel.cancel();
        task.await.unwrap();
    }
}
