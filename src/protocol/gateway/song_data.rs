//! Per-track file metadata from the gateway.
//!
//! # Wire Format
//!
//! ```json
//! {
//!     "SNG_ID": "3135556",
//!     "TRACK_TOKEN": "secret_token",
//!     "MD5_ORIGIN": "51afcde9f56a132096c0496cc95eb24b",
//!     "MEDIA_VERSION": "8",
//!     "FILESIZE_MP3_128": "3596119",
//!     "FILESIZE_MP3_320": "8990301",
//!     "FILESIZE_FLAC": "25731462"
//! }
//! ```
//!
//! Display metadata such as the title is taken from the public API instead.

use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{serde_as, DefaultOnError, DisplayFromStr, PickFirst};
use veil::Redact;

use crate::track::TrackId;

use super::Method;

impl Method for SongData {
    const METHOD: &'static str = "song.getData";
}

/// Request body for [`SongData`].
#[serde_as]
#[derive(Clone, Eq, PartialEq, Serialize, Debug, Hash)]
pub struct Request {
    #[serde(rename = "sng_id")]
    #[serde_as(as = "DisplayFromStr")]
    pub song_id: TrackId,
}

/// Gateway metadata of a single track.
///
/// File sizes are lenient: a missing or unparsable size is zero, which means
/// the format is unavailable.
#[serde_as]
#[derive(Clone, Eq, PartialEq, Deserialize, Redact, Hash)]
pub struct SongData {
    /// Unique song identifier.
    #[serde(rename = "SNG_ID")]
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub id: TrackId,

    /// Opaque token identifying this track to the media endpoints.
    #[serde(default)]
    #[serde(rename = "TRACK_TOKEN")]
    #[redact]
    pub track_token: String,

    /// Hash of the original upload, used to derive CDN paths.
    #[serde(default)]
    #[serde(rename = "MD5_ORIGIN")]
    #[serde_as(as = "DefaultOnError")]
    pub md5_origin: String,

    /// Version of the encoded media files, exactly as the gateway sent it.
    #[serde(default)]
    #[serde(rename = "MEDIA_VERSION")]
    #[serde(deserialize_with = "verbatim")]
    pub media_version: String,

    /// Size of the 128 kbps MP3 file in bytes.
    #[serde(default)]
    #[serde(rename = "FILESIZE_MP3_128")]
    #[serde_as(as = "DefaultOnError<PickFirst<(DisplayFromStr, _)>>")]
    pub filesize_mp3_128: u64,

    /// Size of the 320 kbps MP3 file in bytes.
    #[serde(default)]
    #[serde(rename = "FILESIZE_MP3_320")]
    #[serde_as(as = "DefaultOnError<PickFirst<(DisplayFromStr, _)>>")]
    pub filesize_mp3_320: u64,

    /// Size of the FLAC file in bytes.
    #[serde(default)]
    #[serde(rename = "FILESIZE_FLAC")]
    #[serde_as(as = "DefaultOnError<PickFirst<(DisplayFromStr, _)>>")]
    pub filesize_flac: u64,
}

/// Keeps a string field byte for byte, and a numeric one in its JSON
/// notation. Anything else is empty.
fn verbatim<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(value) => value,
        serde_json::Value::Number(value) => value.to_string(),
        _ => String::new(),
    })
}

impl SongData {
    /// File sizes indexed by [`Quality::index`].
    ///
    /// [`Quality::index`]: crate::protocol::media::Quality::index
    #[must_use]
    pub fn file_sizes(&self) -> [u64; 3] {
        [
            self.filesize_mp3_128,
            self.filesize_mp3_320,
            self.filesize_flac,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_strings() {
        let song: SongData = serde_json::from_str(
            r#"{
                "SNG_ID": "3135556",
                "TRACK_TOKEN": "tok",
                "MD5_ORIGIN": "51afcde9f56a132096c0496cc95eb24b",
                "MEDIA_VERSION": "8",
                "FILESIZE_MP3_128": "3596119",
                "FILESIZE_MP3_320": 8990301,
                "FILESIZE_FLAC": "25731462"
            }"#,
        )
        .unwrap();

        assert_eq!(song.id.to_string(), "3135556");
        assert_eq!(song.media_version, "8");
        assert_eq!(song.file_sizes(), [3_596_119, 8_990_301, 25_731_462]);
    }

    #[test]
    fn media_version_is_kept_verbatim() {
        for (json, expected) in [
            (r#""08""#, "08"),
            (r#""8a""#, "8a"),
            ("12", "12"),
            ("null", ""),
        ] {
            let song: SongData = serde_json::from_str(&format!(
                r#"{{"SNG_ID": 42, "MEDIA_VERSION": {json}}}"#
            ))
            .unwrap();
            assert_eq!(song.media_version, expected, "{json}");
        }
    }

    #[test]
    fn unparsable_or_missing_sizes_are_zero() {
        let song: SongData = serde_json::from_str(
            r#"{"SNG_ID": 42, "FILESIZE_MP3_128": "", "FILESIZE_FLAC": "n/a"}"#,
        )
        .unwrap();
        assert_eq!(song.file_sizes(), [0, 0, 0]);
        assert!(song.media_version.is_empty());
    }

    #[test]
    fn serializes_request() {
        let request = Request {
            song_id: "3135556".parse().unwrap(),
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"sng_id":"3135556"}"#
        );
    }
}
