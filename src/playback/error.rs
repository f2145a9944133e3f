//! Playback error types

use std::time::Duration;

use thiserror::Error;

/// Failure of one manifest load
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    /// Connection, DNS or HTTP status failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Fetch did not complete within the manifest timeout
    #[error("manifest fetch timed out after {0:?}")]
    Timeout(Duration),

    /// Body is not a usable playlist
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl PlaybackError {
    /// Whether the failure came from the network rather than the content
    pub fn is_network(&self) -> bool {
        matches!(self, PlaybackError::Transport(_) | PlaybackError::Timeout(_))
    }
}

impl From<reqwest::Error> for PlaybackError {
    fn from(err: reqwest::Error) -> Self {
        PlaybackError::Transport(err.to_string())
    }
}
