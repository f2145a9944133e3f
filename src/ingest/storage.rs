//! Chunk persistence for the HTTP ingest fallback
//!
//! Storage is an external collaborator: the adapter only needs somewhere to
//! put uploaded chunks so the media engine can pick them up.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use crate::registry::StreamKey;

/// HTTP upload route a chunk arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkTransport {
    /// `MediaRecorder` segments posted by the browser broadcaster
    Browser,
    /// Chunks relayed from a WebRTC capture
    WebRtc,
}

impl ChunkTransport {
    /// Sub-directory used under the stream's storage directory
    pub fn dir_name(&self) -> &'static str {
        match self {
            ChunkTransport::Browser => "browser",
            ChunkTransport::WebRtc => "webrtc",
        }
    }

    /// Multipart field carrying the payload
    pub fn field_name(&self) -> &'static str {
        match self {
            ChunkTransport::Browser => "segment",
            ChunkTransport::WebRtc => "chunk",
        }
    }

    /// File extension of stored chunks
    pub fn extension(&self) -> &'static str {
        "webm"
    }
}

/// Destination for uploaded chunks
#[async_trait]
pub trait ChunkStore: Send + Sync + 'static {
    /// Make sure output locations for `key` exist
    async fn prepare(&self, key: &StreamKey) -> io::Result<()>;

    /// Persist one chunk, returning where it was written
    async fn store(
        &self,
        key: &StreamKey,
        transport: ChunkTransport,
        payload: Bytes,
    ) -> io::Result<PathBuf>;
}

/// Writes chunks to `<root>/<key>/<transport>/<millis>-<seq>.webm`
#[derive(Debug)]
pub struct LocalChunkStore {
    root: PathBuf,
    next_seq: AtomicU64,
}

impl LocalChunkStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding `key`'s output
    pub fn stream_dir(&self, key: &StreamKey) -> PathBuf {
        self.root.join(key.as_str())
    }
}

#[async_trait]
impl ChunkStore for LocalChunkStore {
    async fn prepare(&self, key: &StreamKey) -> io::Result<()> {
        let dir = self.stream_dir(key);
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(stream = %key, dir = %dir.display(), "Output directory ready");
        Ok(())
    }

    async fn store(
        &self,
        key: &StreamKey,
        transport: ChunkTransport,
        payload: Bytes,
    ) -> io::Result<PathBuf> {
        let dir = self.stream_dir(key).join(transport.dir_name());
        tokio::fs::create_dir_all(&dir).await?;

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let millis = chrono::Utc::now().timestamp_millis();
        let path = dir.join(format!("{millis}-{seq:06}.{}", transport.extension()));

        tokio::fs::write(&path, &payload).await?;

        tracing::trace!(
            stream = %key,
            path = %path.display(),
            bytes = payload.len(),
            "Chunk stored"
        );

        Ok(path)
    }
}
