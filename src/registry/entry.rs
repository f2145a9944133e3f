//! Stream session and patch types
//!
//! This module defines the per-stream state stored in the registry.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::key::StreamKey;

/// Transport that created or last touched a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IngestMethod {
    /// Primary binary protocol, via media engine callbacks
    Protocol,
    /// HTTP chunk-upload fallback
    HttpChunk,
}

/// State of one live broadcast
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSession {
    /// Stream key (unique per session)
    pub stream_key: StreamKey,

    /// When the session was created; never changes
    pub start_time: DateTime<Utc>,

    /// Current number of viewers
    pub viewer_count: u32,

    /// True for the whole lifetime of the session
    pub is_live: bool,

    /// Last chunk or heartbeat arrival
    pub last_update_time: DateTime<Utc>,

    /// Transport that created the session; never changes
    pub created_by: IngestMethod,

    /// Transport that last touched the session
    pub ingest_method: IngestMethod,

    /// Sum of accepted chunk payload sizes
    pub bytes_received: u64,

    /// Resolution reported by the publisher, e.g. "1280x720"
    pub resolution: Option<String>,
}

impl StreamSession {
    pub(super) fn new(stream_key: StreamKey, method: IngestMethod, now: DateTime<Utc>) -> Self {
        Self {
            stream_key,
            start_time: now,
            viewer_count: 0,
            is_live: true,
            last_update_time: now,
            created_by: method,
            ingest_method: method,
            bytes_received: 0,
            resolution: None,
        }
    }

    /// Whole seconds elapsed since the session started (never negative)
    pub fn duration_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.start_time).num_seconds().max(0) as u64
    }

    /// Bitrate estimate in bits per second, 0 when unknown
    pub fn bitrate(&self, now: DateTime<Utc>) -> u64 {
        let secs = self.duration_secs(now);
        if secs > 0 {
            self.bytes_received.saturating_mul(8) / secs
        } else {
            0
        }
    }

    /// Whether nothing has refreshed this session within `timeout`
    pub fn is_idle(&self, now: DateTime<Utc>, timeout: std::time::Duration) -> bool {
        match chrono::Duration::from_std(timeout) {
            Ok(timeout) => now - self.last_update_time > timeout,
            Err(_) => false,
        }
    }
}

/// Partial update for [`StreamSession`]
///
/// Fields left as `None` (or a zero byte delta) are not touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub last_update_time: Option<DateTime<Utc>>,
    pub ingest_method: Option<IngestMethod>,
    pub resolution: Option<String>,
    /// Added to `bytes_received`
    pub bytes_received: u64,
}

impl SessionPatch {
    /// Empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch representing one chunk arrival
    pub fn chunk(now: DateTime<Utc>, bytes: u64) -> Self {
        Self {
            last_update_time: Some(now),
            ingest_method: Some(IngestMethod::HttpChunk),
            resolution: None,
            bytes_received: bytes,
        }
    }

    /// Set the last update time
    pub fn last_update_time(mut self, at: DateTime<Utc>) -> Self {
        self.last_update_time = Some(at);
        self
    }

    /// Set the ingest method
    pub fn ingest_method(mut self, method: IngestMethod) -> Self {
        self.ingest_method = Some(method);
        self
    }

    /// Set the resolution
    pub fn resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    /// Merge into a session
    pub(super) fn apply(self, session: &mut StreamSession) {
        if let Some(at) = self.last_update_time {
            session.last_update_time = at;
        }
        if let Some(method) = self.ingest_method {
            session.ingest_method = method;
        }
        if let Some(resolution) = self.resolution {
            session.resolution = Some(resolution);
        }
        session.bytes_received = session.bytes_received.saturating_add(self.bytes_received);
    }
}
