//! Stream registry implementation
//!
//! The central, in-memory source of truth for which stream keys are live.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::config::RegistryConfig;
use super::entry::{IngestMethod, SessionPatch, StreamSession};
use super::key::StreamKey;

/// Central registry for all live sessions
///
/// Every mutation takes the write guard, so mutations are serialized. Reads
/// clone under the read guard and never observe a half-applied change. No
/// method performs I/O while holding either guard.
pub struct StreamRegistry {
    /// Map of stream key to session
    sessions: RwLock<HashMap<StreamKey, StreamSession>>,

    /// Configuration
    config: RegistryConfig,
}

impl StreamRegistry {
    /// Create a new stream registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new stream registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Create a session for `key` via the protocol transport
    ///
    /// Idempotent: if the key is already live the existing session is returned
    /// with only `last_update_time` refreshed.
    pub async fn create(&self, key: &StreamKey) -> StreamSession {
        self.create_with(key, IngestMethod::Protocol).await
    }

    /// Create a session recording which transport created it
    pub async fn create_with(&self, key: &StreamKey, method: IngestMethod) -> StreamSession {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;

        if let Some(existing) = sessions.get_mut(key) {
            existing.last_update_time = now;
            tracing::debug!(stream = %key, "Session already live, refreshed");
            return existing.clone();
        }

        let session = StreamSession::new(key.clone(), method, now);
        sessions.insert(key.clone(), session.clone());

        tracing::info!(
            stream = %key,
            method = ?method,
            live = sessions.len(),
            "Session created"
        );

        session
    }

    /// Remove a session
    ///
    /// Returns whether a session was actually removed; a second call is a no-op.
    pub async fn remove(&self, key: &StreamKey) -> bool {
        let removed = self.sessions.write().await.remove(key);

        if let Some(session) = &removed {
            tracing::info!(
                stream = %key,
                duration_secs = session.duration_secs(Utc::now()),
                viewers = session.viewer_count,
                "Session removed"
            );
        }

        removed.is_some()
    }

    /// Get a copy of the session for `key`
    pub async fn get(&self, key: &StreamKey) -> Option<StreamSession> {
        self.sessions.read().await.get(key).cloned()
    }

    /// Look up a session by raw key without validating it
    ///
    /// Malformed keys can never be registered, so they simply miss.
    pub async fn get_raw(&self, key: &str) -> Option<StreamSession> {
        self.sessions.read().await.get(key).cloned()
    }

    /// Snapshot of all sessions
    pub async fn list(&self) -> Vec<StreamSession> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is live
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Add one viewer; no-op if the session does not exist
    pub async fn increment_viewer(&self, key: &StreamKey) {
        let mut sessions = self.sessions.write().await;

        if let Some(session) = sessions.get_mut(key) {
            session.viewer_count = session.viewer_count.saturating_add(1);
            tracing::debug!(stream = %key, viewers = session.viewer_count, "Viewer joined");
        }
    }

    /// Remove one viewer, never going below zero; no-op if absent
    pub async fn decrement_viewer(&self, key: &StreamKey) {
        let mut sessions = self.sessions.write().await;

        if let Some(session) = sessions.get_mut(key) {
            session.viewer_count = session.viewer_count.saturating_sub(1);
            tracing::debug!(stream = %key, viewers = session.viewer_count, "Viewer left");
        }
    }

    /// Merge `patch` into an existing session
    ///
    /// Returns the updated session, or `None` if the key is not live.
    pub async fn touch(&self, key: &StreamKey, patch: SessionPatch) -> Option<StreamSession> {
        let mut sessions = self.sessions.write().await;

        let session = sessions.get_mut(key)?;
        patch.apply(session);
        Some(session.clone())
    }

    /// Create the session if needed, then merge `patch`, under one write guard
    ///
    /// Returns the updated session and whether it was created by this call.
    pub async fn upsert_touch(
        &self,
        key: &StreamKey,
        method: IngestMethod,
        patch: SessionPatch,
    ) -> (StreamSession, bool) {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;

        let created = !sessions.contains_key(key);
        let session = sessions
            .entry(key.clone())
            .or_insert_with(|| StreamSession::new(key.clone(), method, now));
        patch.apply(session);
        let session = session.clone();

        if created {
            tracing::info!(
                stream = %key,
                method = ?method,
                live = sessions.len(),
                "Session created implicitly"
            );
        }

        (session, created)
    }

    /// Remove sessions that have been idle longer than `idle_timeout`
    ///
    /// Returns the keys that were removed.
    pub async fn reap_idle(&self, now: DateTime<Utc>) -> Vec<StreamKey> {
        let mut sessions = self.sessions.write().await;
        let timeout = self.config.idle_timeout;
        let include_protocol = self.config.reap_protocol_sessions;

        let keys_to_remove: Vec<StreamKey> = sessions
            .values()
            .filter(|s| include_protocol || s.created_by == IngestMethod::HttpChunk)
            .filter(|s| s.is_idle(now, timeout))
            .map(|s| s.stream_key.clone())
            .collect();

        for key in &keys_to_remove {
            sessions.remove(key);
            tracing::info!(
                stream = %key,
                idle_timeout_secs = timeout.as_secs(),
                "Session removed by idle reaper"
            );
        }

        keys_to_remove
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}
