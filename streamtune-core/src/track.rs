use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Catalog identifier of a track. Identity is the id alone.
pub type TrackId = u64;

/// Bitrate requested from the stream endpoint when nothing else is configured
pub const DEFAULT_BITRATE: u32 = 192;

/// A playable track as returned by the catalog endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
}

impl Track {
    pub fn new(id: TrackId, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            artist: artist.into(),
        }
    }

    /// Streaming URL for this track: `<stream_base>/<id>/<bitrate>`
    pub fn stream_url(&self, stream_base: &str, bitrate: u32) -> String {
        format!("{}/{}/{}", stream_base.trim_end_matches('/'), self.id, bitrate)
    }
}

impl Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.title, self.artist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_joins_base_id_and_bitrate() {
        let track = Track::new(42, "Song", "Band");
        assert_eq!(
            track.stream_url("http://host:3000/stream", DEFAULT_BITRATE),
            "http://host:3000/stream/42/192"
        );
        assert_eq!(
            track.stream_url("http://host:3000/stream/", 320),
            "http://host:3000/stream/42/320"
        );
    }

    #[test]
    fn deserializes_catalog_record() {
        let track: Track =
            serde_json::from_str(r#"{"id": 7, "title": "Intro", "artist": "Nobody"}"#).unwrap();
        assert_eq!(track, Track::new(7, "Intro", "Nobody"));
    }
}
