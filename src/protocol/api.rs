//! Public REST API types.
//!
//! Only display metadata is taken from the public API; it has no bearing on
//! stream resolution or decryption.
//!
//! # Wire Format
//!
//! ```json
//! {
//!     "id": 3135556,
//!     "title": "Harder, Better, Faster, Stronger",
//!     "duration": 224,
//!     "artist": { "name": "Daft Punk" },
//!     "album": { "title": "Discovery" }
//! }
//! ```
//!
//! Unknown tracks are reported with a success status and an error body:
//! ```json
//! { "error": { "type": "DataException", "message": "no data", "code": 800 } }
//! ```

use std::{fmt, time::Duration};

use serde::Deserialize;
use serde_with::{formats::Flexible, serde_as, DefaultOnError, DurationSeconds};

/// Response of the public track endpoint.
#[derive(Clone, PartialEq, Deserialize, Debug)]
#[serde(untagged)]
pub enum Response {
    /// The track could not be served.
    Error { error: ApiError },

    /// Track metadata.
    Track(PublicTrack),
}

/// Display metadata of a track.
#[serde_as]
#[derive(Clone, Default, Eq, PartialEq, Deserialize, Debug, Hash)]
pub struct PublicTrack {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub artist: Artist,

    #[serde(default)]
    pub album: Album,

    #[serde(default)]
    #[serde_as(as = "DefaultOnError<DurationSeconds<u64, Flexible>>")]
    pub duration: Duration,
}

#[derive(Clone, Default, Eq, PartialEq, Deserialize, Debug, Hash)]
pub struct Artist {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Default, Eq, PartialEq, Deserialize, Debug, Hash)]
pub struct Album {
    #[serde(default)]
    pub title: String,
}

/// Error reported by the public API.
#[derive(Clone, Default, Eq, PartialEq, Deserialize, Debug, Hash)]
pub struct ApiError {
    #[serde(default, rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: i64,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}: {})", self.message, self.typ, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_track() {
        let response: Response = serde_json::from_str(
            r#"{
                "id": 3135556,
                "title": "Harder, Better, Faster, Stronger",
                "duration": 224,
                "artist": {"id": 27, "name": "Daft Punk"},
                "album": {"id": 302127, "title": "Discovery"}
            }"#,
        )
        .unwrap();

        let Response::Track(track) = response else {
            panic!("expected track");
        };
        assert_eq!(track.title, "Harder, Better, Faster, Stronger");
        assert_eq!(track.artist.name, "Daft Punk");
        assert_eq!(track.album.title, "Discovery");
        assert_eq!(track.duration, Duration::from_secs(224));
    }

    #[test]
    fn parses_error() {
        let response: Response = serde_json::from_str(
            r#"{"error": {"type": "DataException", "message": "no data", "code": 800}}"#,
        )
        .unwrap();

        let Response::Error { error } = response else {
            panic!("expected error");
        };
        assert_eq!(error.to_string(), "no data (DataException: 800)");
    }
}
