//! Viewer-side playback resilience
//!
//! A [`PlaybackClient`] loads a stream's HLS playlist, falling back across
//! alternative delivery URLs and retrying with backoff. It shares no state
//! with the server side.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod manifest;
pub mod player;
pub mod urls;

pub use config::PlayerConfig;
pub use error::PlaybackError;
pub use fetcher::{HttpManifestFetcher, ManifestFetcher};
pub use manifest::Manifest;
pub use player::{PlaybackClient, PlayerEvent, PlayerState, UNAVAILABLE};
pub use urls::{derive_alternatives, manifest_path};
