//! Direct media sources from the gateway's list data method.
//!
//! # Wire Format
//!
//! Request:
//! ```json
//! { "sng_ids": ["<track token>"] }
//! ```
//!
//! Response results, either paginated or as a bare list:
//! ```json
//! {
//!     "data": [{
//!         "SNG_ID": "3135556",
//!         "MEDIA": [{ "TYPE": "full", "HREF": "https://..." }]
//!     }],
//!     "count": 1,
//!     "total": 1
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnError};
use url::Url;
use veil::Redact;

use super::Method;

impl Method for ListData {
    const METHOD: &'static str = "song.getListData";
}

/// Request parameters for list data.
///
/// The field is a list of song IDs by name, but is keyed with the single
/// track token of the track being resolved.
#[derive(Clone, Eq, PartialEq, Serialize, Redact, Hash)]
pub struct Request {
    #[serde(rename = "sng_ids")]
    #[redact]
    pub song_ids: Vec<String>,
}

impl Request {
    #[must_use]
    pub fn with_track_token(track_token: &str) -> Self {
        Self {
            song_ids: vec![track_token.to_owned()],
        }
    }
}

/// Results of the list data method.
#[serde_as]
#[derive(Clone, PartialEq, Deserialize, Debug)]
#[serde(untagged)]
pub enum ListData {
    /// Paginated result set
    Paginated {
        /// Items in this page of results
        data: Vec<ListItem>,
    },

    /// Direct list of results (single item or array)
    Unpaginated(#[serde_as(as = "serde_with::OneOrMany<_>")] Vec<ListItem>),
}

impl ListData {
    /// Returns all result items as a slice.
    #[must_use]
    pub fn all(&self) -> &[ListItem] {
        match self {
            Self::Paginated { data } => data,
            Self::Unpaginated(data) => data,
        }
    }

    /// URL of the first media source of the first item, if any.
    #[must_use]
    pub fn first_source(&self) -> Option<&Url> {
        self.all().first().and_then(ListItem::source)
    }
}

/// A single track in a list data response.
#[derive(Clone, PartialEq, Deserialize, Debug, Default)]
pub struct ListItem {
    /// Media sources for this track.
    #[serde(default)]
    #[serde(rename = "MEDIA")]
    pub media: Vec<MediaSource>,
}

impl ListItem {
    /// URL of the first media source that has one.
    #[must_use]
    pub fn source(&self) -> Option<&Url> {
        self.media.iter().find_map(|medium| medium.url.as_ref())
    }
}

/// A media source entry.
#[serde_as]
#[derive(Clone, PartialEq, Deserialize, Debug, Default)]
pub struct MediaSource {
    /// Source type, e.g. "preview" or "full".
    #[serde(default)]
    #[serde(rename = "TYPE")]
    pub typ: String,

    /// Location of the media; absent or invalid URLs are ignored.
    #[serde(default)]
    #[serde(rename = "HREF")]
    #[serde_as(as = "DefaultOnError")]
    pub url: Option<Url>,
}
