//! Status snapshot sent to viewers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::StreamSession;

/// Point-in-time status of one stream key
///
/// Serialized as `{ isLive, viewerCount, duration, bitrate, resolution, timestamp }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_live: bool,
    pub viewer_count: u32,
    /// Seconds since the session started
    #[serde(rename = "duration")]
    pub duration_seconds: u64,
    /// Bits per second, 0 when unknown
    pub bitrate: u64,
    /// e.g. "1280x720", empty when unknown
    pub resolution: String,
    pub timestamp: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Snapshot of a live session
    pub fn from_session(session: &StreamSession, now: DateTime<Utc>) -> Self {
        Self {
            is_live: session.is_live,
            viewer_count: session.viewer_count,
            duration_seconds: session.duration_secs(now),
            bitrate: session.bitrate(now),
            resolution: session.resolution.clone().unwrap_or_default(),
            timestamp: now,
        }
    }

    /// Snapshot for a key with no session
    pub fn offline(now: DateTime<Utc>) -> Self {
        Self {
            is_live: false,
            viewer_count: 0,
            duration_seconds: 0,
            bitrate: 0,
            resolution: String::new(),
            timestamp: now,
        }
    }

    /// Snapshot for an optional session
    pub fn for_session(session: Option<&StreamSession>, now: DateTime<Utc>) -> Self {
        match session {
            Some(session) => Self::from_session(session, now),
            None => Self::offline(now),
        }
    }
}
