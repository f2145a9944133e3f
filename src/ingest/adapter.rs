//! Ingest adapter
//!
//! Turns media engine callbacks and HTTP chunk uploads into registry
//! mutations.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::registry::{IngestMethod, SessionPatch, StreamKey, StreamRegistry, StreamSession};
use crate::stats::LiveStats;

use super::hooks::{HookResult, IngestHooks};
use super::state::{PublishEvent, PublishPhase};
use super::storage::{ChunkStore, ChunkTransport};

/// Adapter between ingest transports and the registry
pub struct IngestAdapter {
    registry: Arc<StreamRegistry>,
    store: Arc<dyn ChunkStore>,
    stats: Arc<LiveStats>,
    /// Non-terminal publish phases of protocol streams; absent means `Idle`
    phases: DashMap<StreamKey, PublishPhase>,
}

impl IngestAdapter {
    /// Create an adapter over `registry`, persisting chunks to `store`
    pub fn new(registry: Arc<StreamRegistry>, store: Arc<dyn ChunkStore>) -> Self {
        Self::with_stats(registry, store, Arc::new(LiveStats::new()))
    }

    /// Create an adapter sharing an existing stats tracker
    pub fn with_stats(
        registry: Arc<StreamRegistry>,
        store: Arc<dyn ChunkStore>,
        stats: Arc<LiveStats>,
    ) -> Self {
        Self {
            registry,
            store,
            stats,
            phases: DashMap::new(),
        }
    }

    /// Get a reference to the stream registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Current publish phase of `key` on the protocol transport
    pub fn phase(&self, key: &str) -> PublishPhase {
        self.phases
            .get(key)
            .map(|p| *p)
            .unwrap_or(PublishPhase::Idle)
    }

    fn advance(&self, key: &StreamKey, event: PublishEvent) -> PublishPhase {
        let mut entry = self.phases.entry(key.clone()).or_insert(PublishPhase::Idle);
        let from = *entry;
        let to = from.on_event(event);
        *entry = to;
        drop(entry);

        if to.is_terminal() {
            self.phases.remove(key);
        }
        if from != to {
            tracing::debug!(stream = %key, ?from, ?to, "Publish phase changed");
        }
        to
    }

    /// Accept one chunk from the HTTP fallback
    ///
    /// The chunk is persisted before the registry is touched, so a storage
    /// failure never holds the registry lock and leaves any live session as is.
    /// The first chunk for a key creates its session.
    pub async fn on_chunk(
        &self,
        raw_key: &str,
        transport: ChunkTransport,
        payload: Bytes,
    ) -> Result<StreamSession> {
        let key = StreamKey::parse(raw_key).inspect_err(|e| {
            tracing::warn!(key = raw_key, error = %e, "Chunk rejected: invalid stream key");
        })?;

        let bytes = payload.len() as u64;
        if let Err(e) = self.store.store(&key, transport, payload).await {
            self.stats.record_storage_failure();
            tracing::error!(
                stream = %key,
                transport = transport.dir_name(),
                error = %e,
                "Failed to store chunk"
            );
            return Err(Error::Storage(e));
        }
        self.stats.record_chunk(bytes);

        let (session, created) = self
            .registry
            .upsert_touch(
                &key,
                IngestMethod::HttpChunk,
                SessionPatch::chunk(Utc::now(), bytes),
            )
            .await;

        if created {
            tracing::info!(
                stream = %key,
                transport = transport.dir_name(),
                "Stream went live via chunk upload"
            );
        }

        Ok(session)
    }

    /// Remove idle sessions and forget their publish phases
    ///
    /// Returns the keys that were removed.
    pub async fn reap_idle(&self, now: DateTime<Utc>) -> Vec<StreamKey> {
        let reaped = self.registry.reap_idle(now).await;
        for key in &reaped {
            if let Some((_, phase)) = self.phases.remove(key) {
                tracing::debug!(stream = %key, ?phase, "Publish phase dropped by idle reaper");
            }
        }
        reaped
    }

    /// Spawn background reaper task
    ///
    /// Runs [`reap_idle`](Self::reap_idle) every `reap_interval` of the
    /// registry config. The task stops when `cancel` fires.
    pub fn spawn_reaper(self: &Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let adapter = Arc::clone(self);
        let interval = adapter.registry.config().reap_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        adapter.reap_idle(Utc::now()).await;
                    }
                }
            }
            tracing::debug!("Idle reaper stopped");
        })
    }

    /// Record a resolution reported by the publisher
    pub async fn report_resolution(&self, raw_key: &str, resolution: &str) -> Result<bool> {
        let key = StreamKey::parse(raw_key)?;
        let touched = self
            .registry
            .touch(&key, SessionPatch::new().resolution(resolution))
            .await;
        Ok(touched.is_some())
    }

    fn parse_notification(&self, hook: &'static str, raw_key: &str) -> Option<StreamKey> {
        match StreamKey::parse(raw_key) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(key = raw_key, hook, error = %e, "Ignoring hook for invalid key");
                None
            }
        }
    }
}

#[async_trait]
impl IngestHooks for IngestAdapter {
    async fn pre_publish(&self, raw_key: &str) -> HookResult {
        let key = match StreamKey::parse(raw_key) {
            Ok(key) => key,
            Err(e) => {
                self.stats.record_publish_rejected();
                tracing::warn!(key = raw_key, error = %e, "Publish rejected");
                return HookResult::Reject(e.to_string());
            }
        };

        self.registry.create(&key).await;
        self.advance(&key, PublishEvent::PrePublish { valid: true });
        self.stats.record_publish_accepted();

        tracing::info!(stream = %key, "Publish accepted");
        HookResult::Accept
    }

    async fn post_publish(&self, raw_key: &str) {
        let Some(key) = self.parse_notification("post_publish", raw_key) else {
            return;
        };

        if let Err(e) = self.store.prepare(&key).await {
            tracing::error!(stream = %key, error = %e, "Failed to prepare output directory");
        }

        self.advance(&key, PublishEvent::PostPublish);
    }

    async fn done_publish(&self, raw_key: &str) {
        let Some(key) = self.parse_notification("done_publish", raw_key) else {
            return;
        };

        let removed = self.registry.remove(&key).await;
        self.advance(&key, PublishEvent::DonePublish);

        if !removed {
            tracing::debug!(stream = %key, "Unpublish for stream that was not live");
        }
    }

    async fn pre_play(&self, raw_key: &str) -> HookResult {
        match StreamKey::parse(raw_key) {
            Ok(key) => {
                tracing::debug!(stream = %key, "Play requested");
                HookResult::Accept
            }
            Err(e) => HookResult::Reject(e.to_string()),
        }
    }

    async fn post_play(&self, raw_key: &str) {
        if let Some(key) = self.parse_notification("post_play", raw_key) {
            self.registry.increment_viewer(&key).await;
        }
    }

    async fn done_play(&self, raw_key: &str) {
        if let Some(key) = self.parse_notification("done_play", raw_key) {
            self.registry.decrement_viewer(&key).await;
        }
    }
}
