//! Live-stream session registry and real-time status fan-out
//!
//! Tracks which stream keys are live, reconciles events from the primary
//! streaming protocol (reported by an external media engine) and an HTTP
//! chunk-upload fallback, and pushes status snapshots to viewers over
//! WebSocket. A separate playback client loads HLS playlists with fallback
//! across alternative delivery URLs.
//!
//! # Server
//!
//! ```no_run
//! use nf_live::{LiveServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> nf_live::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let server = LiveServer::new(config);
//!     server
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//! }
//! ```
//!
//! # Playback
//!
//! ```no_run
//! use std::sync::Arc;
//! use nf_live::playback::{HttpManifestFetcher, PlaybackClient, PlayerConfig, PlayerEvent};
//!
//! # async fn play() -> Result<(), url::ParseError> {
//! let primary = url::Url::parse("https://cdn.example.com/live/nf_ab12345678/index.m3u8")?;
//! let (player, mut events) = PlaybackClient::spawn(
//!     PlayerConfig::default(),
//!     primary,
//!     "nf_ab12345678",
//!     Arc::new(HttpManifestFetcher::new()),
//! );
//!
//! while let Some(event) = events.recv().await {
//!     if let PlayerEvent::Unavailable(reason) = event {
//!         eprintln!("stream unavailable: {reason}");
//!     }
//! }
//! player.dispose();
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod error;
pub mod ingest;
pub mod playback;
pub mod registry;
pub mod server;
pub mod stats;

pub use broadcast::{StatusBroadcaster, StatusSnapshot};
pub use error::{Error, Result};
pub use ingest::{ChunkStore, ChunkTransport, HookResult, IngestAdapter, IngestHooks, LocalChunkStore};
pub use playback::{PlaybackClient, PlayerConfig, PlayerEvent, PlayerState};
pub use registry::{StreamKey, StreamRegistry, StreamSession};
pub use server::{LiveServer, ServerConfig};
pub use stats::{LiveStats, StatsSnapshot};
