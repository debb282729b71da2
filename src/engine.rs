//! Request orchestration: one track request from validation to response.
//!
//! Every request runs the same linear pipeline:
//!
//! ```text
//! Unauthenticated → Authenticated → MetadataResolved → UrlResolved
//!     → MetadataReturned   (action "info")
//!     → BytesStreamed      (action "stream")
//! ```
//!
//! Any stage may fail, which ends the request. Nothing is retried and
//! nothing is kept between requests.

use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use url::Url;

use crate::{
    arl::Arl,
    config::Config,
    decrypt,
    error::{Error, Result},
    gateway::Gateway,
    http::Client as HttpClient,
    protocol::media::{Format, Quality},
    secrets::{CredentialStore, Keys},
    track::{self, TrackId},
};

/// Body of a track request.
///
/// All fields are optional on the wire so that validation can report what
/// is missing instead of failing to parse.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    /// Track to resolve, as a decimal string or a JSON number.
    #[serde(default)]
    pub track_id: Option<serde_json::Value>,

    /// Requested quality tier, 0 to 2. Defaults to lossless.
    #[serde(default)]
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub quality: Option<i64>,

    /// `"info"` or `"stream"`. Defaults to `"info"`.
    #[serde(default)]
    pub action: Option<String>,
}

/// What to return for a resolved track.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Action {
    /// Return the resolved metadata.
    #[default]
    Info,
    /// Return the (decrypted) audio bytes.
    Stream,
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "info" => Ok(Self::Info),
            "stream" => Ok(Self::Stream),
            _ => Err(Error::invalid_argument("Invalid action")),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Stream => write!(f, "stream"),
        }
    }
}

/// A request that passed validation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Validated {
    pub track_id: TrackId,
    pub quality: Quality,
    pub action: Action,
}

impl TrackRequest {
    /// Validates the request without touching any upstream service.
    ///
    /// Checks run in a fixed order: track ID present, track ID numeric,
    /// quality in range, action known.
    ///
    /// # Errors
    ///
    /// Returns an invalid argument error naming the first failed check.
    pub fn validate(&self) -> Result<Validated> {
        let track_id = match &self.track_id {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(id)) => Some(id.trim().to_owned()),
            Some(serde_json::Value::Number(id)) => Some(id.to_string()),
            Some(_) => return Err(Error::invalid_argument("Invalid trackId")),
        };

        let track_id = match track_id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(Error::invalid_argument("trackId required")),
        };

        let track_id = track_id
            .parse::<TrackId>()
            .map_err(|_| Error::invalid_argument("Invalid trackId"))?;

        let quality = match self.quality {
            None => Quality::default(),
            Some(quality) => u8::try_from(quality)
                .map_err(|_| Error::invalid_argument("Invalid quality"))
                .and_then(Quality::try_from)?,
        };

        let action = self
            .action
            .as_deref()
            .map_or(Ok(Action::default()), str::parse)?;

        Ok(Validated {
            track_id,
            quality,
            action,
        })
    }
}

/// Resolved metadata of a track, as returned by the `info` action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub url: Url,
    pub quality: u8,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub format: String,
    pub id: TrackId,
    pub is_encrypted: bool,
}

/// Successful result of a track request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Info(TrackInfo),
    Stream { format: Format, bytes: Vec<u8> },
}

/// Pipeline stage of a request.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum State {
    #[default]
    Unauthenticated,
    Authenticated,
    MetadataResolved,
    UrlResolved,
    MetadataReturned,
    BytesStreamed,
    Failed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated => "authenticated",
            Self::MetadataResolved => "metadata resolved",
            Self::UrlResolved => "url resolved",
            Self::MetadataReturned => "metadata returned",
            Self::BytesStreamed => "bytes streamed",
            Self::Failed => "failed",
        };
        write!(f, "{state}")
    }
}

/// Track request handler.
///
/// Holds only immutable configuration and is cheap to clone into every
/// request.
#[derive(Clone)]
pub struct Engine {
    config: Arc<Config>,
    keys: Keys,
    credentials: Arc<dyn CredentialStore>,
}

impl Engine {
    pub fn new<C>(config: Config, keys: Keys, credentials: C) -> Self
    where
        C: CredentialStore + 'static,
    {
        Self {
            config: Arc::new(config),
            keys,
            credentials: Arc::new(credentials),
        }
    }

    /// Validates and runs a track request.
    ///
    /// # Errors
    ///
    /// Returns an invalid argument error for a malformed request, a
    /// configuration error when no credential is configured, or the error of
    /// the first pipeline stage that fails.
    pub async fn handle(&self, request: &TrackRequest) -> Result<Outcome> {
        let Validated {
            track_id,
            quality,
            action,
        } = request.validate()?;

        // Stores may hit the filesystem.
        let credentials = Arc::clone(&self.credentials);
        let credential = tokio::task::spawn_blocking(move || credentials.credential())
            .await
            .map_err(Error::internal)??
            .ok_or_else(|| Error::configuration("credential not configured"))?;

        handle(&self.config, &self.keys, &credential, track_id, quality, action).await
    }
}

/// Runs the pipeline for one validated request.
///
/// # Errors
///
/// Returns the error of the first stage that fails.
pub async fn handle(
    config: &Config,
    keys: &Keys,
    credential: &Arl,
    track_id: TrackId,
    quality: Quality,
    action: Action,
) -> Result<Outcome> {
    let mut state = State::default();
    debug!("track {track_id}: {action} at quality {quality}");

    match run(config, keys, credential, track_id, quality, action, &mut state).await {
        Ok(outcome) => {
            debug!("track {track_id}: {state}");
            Ok(outcome)
        }
        Err(e) => {
            debug!("track {track_id}: {} after {state}: {e}", State::Failed);
            Err(e)
        }
    }
}

fn advance(track_id: TrackId, state: &mut State, next: State) {
    trace!("track {track_id}: {state} -> {next}");
    *state = next;
}

async fn run(
    config: &Config,
    keys: &Keys,
    credential: &Arl,
    track_id: TrackId,
    quality: Quality,
    action: Action,
    state: &mut State,
) -> Result<Outcome> {
    let mut gateway = Gateway::new(config, credential)?;
    gateway.login().await?;
    advance(track_id, state, State::Authenticated);

    let public = gateway.public_track(track_id).await?;
    let song = gateway.song_data(track_id).await?;
    advance(track_id, state, State::MetadataResolved);

    let stream = track::resolve_stream(&gateway, keys, &song, quality).await?;
    advance(track_id, state, State::UrlResolved);

    let format = stream.quality.format();
    match action {
        Action::Info => {
            let info = TrackInfo {
                quality: stream.quality.index(),
                title: public.title,
                artist: public.artist.name,
                album: public.album.title,
                format: format.to_string(),
                id: song.id,
                is_encrypted: stream.encrypted,
                url: stream.url,
            };
            advance(track_id, state, State::MetadataReturned);
            Ok(Outcome::Info(info))
        }
        Action::Stream => {
            let client = HttpClient::without_cookies(config)?;
            let mut bytes = track::download(&client, &stream).await?;

            if stream.encrypted {
                let key = decrypt::key_for_track_id(song.id, &keys.blowfish);
                decrypt::decrypt_in_place(&mut bytes, &key)?;
            }

            advance(track_id, state, State::BytesStreamed);
            Ok(Outcome::Stream { format, bytes })
        }
    }
}
