//! Minimal HLS playlist parsing
//!
//! Only what the player needs to decide that a playlist is playable:
//! media segment URIs, variant stream URIs and a few header tags.

use super::error::PlaybackError;

/// A parsed playlist
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Media segment URIs in playlist order
    pub segments: Vec<String>,
    /// Variant playlist URIs of a master playlist
    pub variants: Vec<String>,
    /// `#EXT-X-TARGETDURATION`
    pub target_duration: Option<u64>,
    /// `#EXT-X-MEDIA-SEQUENCE`
    pub media_sequence: Option<u64>,
    /// `#EXT-X-ENDLIST` seen; the stream has finished
    pub ended: bool,
}

impl Manifest {
    /// Parse playlist text
    ///
    /// Fails with [`PlaybackError::Protocol`] if the `#EXTM3U` header is
    /// missing or the playlist has neither segments nor variants.
    pub fn parse(text: &str) -> Result<Self, PlaybackError> {
        let mut lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty());

        match lines.next() {
            Some(first) if first.starts_with("#EXTM3U") => {}
            _ => return Err(PlaybackError::Protocol("missing #EXTM3U header".into())),
        }

        let mut manifest = Manifest::default();
        let mut expect_variant = false;

        for line in lines {
            if let Some(tag) = line.strip_prefix('#') {
                if tag.starts_with("EXT-X-STREAM-INF") {
                    expect_variant = true;
                } else if let Some(value) = tag.strip_prefix("EXT-X-TARGETDURATION:") {
                    manifest.target_duration = value.trim().parse().ok();
                } else if let Some(value) = tag.strip_prefix("EXT-X-MEDIA-SEQUENCE:") {
                    manifest.media_sequence = value.trim().parse().ok();
                } else if tag == "EXT-X-ENDLIST" {
                    manifest.ended = true;
                }
                continue;
            }

            if expect_variant {
                manifest.variants.push(line.to_string());
                expect_variant = false;
            } else {
                manifest.segments.push(line.to_string());
            }
        }

        if manifest.segments.is_empty() && manifest.variants.is_empty() {
            return Err(PlaybackError::Protocol(
                "playlist has no segments or variants".into(),
            ));
        }

        Ok(manifest)
    }

    /// Whether this is a master playlist
    pub fn is_master(&self) -> bool {
        !self.variants.is_empty()
    }
}
