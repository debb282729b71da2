//! Track identifiers, stream URL resolution and media download.
//!
//! A stream is resolved in two steps:
//! 1. the best available quality tier at or below the requested one is
//!    picked from the gateway's file sizes
//! 2. the gateway is asked for a direct media source; when it has none, the
//!    CDN path is derived from the track's origin hash and media version
//!
//! Streams served from the `/mobile/` or `/media/` CDN paths are encrypted
//! and have to go through [`crate::decrypt`] before playback.

use std::{fmt, num::NonZeroI64, str::FromStr};

use aes::{
    cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit},
    Aes128,
};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    decrypt::Key,
    error::{Error, Result},
    gateway::Gateway,
    http::Client as HttpClient,
    protocol::{gateway::SongData, media::Quality},
    secrets::Keys,
};

/// Numeric track identifier.
///
/// User-uploaded tracks have negative identifiers; zero is never valid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TrackId(NonZeroI64);

impl TrackId {
    #[must_use]
    pub fn get(self) -> i64 {
        self.0.get()
    }
}

impl FromStr for TrackId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id = s
            .trim()
            .parse::<NonZeroI64>()
            .map_err(|e| Error::invalid_argument(format!("track id {s:?} is invalid: {e}")))?;
        Ok(Self(id))
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stream URL together with its quality tier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedStream {
    pub url: Url,
    pub quality: Quality,
    pub encrypted: bool,
}

/// Separator between the fields of a derived CDN path.
const FIELD_SEPARATOR: u8 = 0xa4;

/// Format number sent in derived paths.
const FORMAT_NUMBER: &[u8] = b"1";

/// AES block size in bytes.
const AES_BLOCK_SIZE: usize = 16;

/// Derives the CDN URL of a track from its origin hash and media version.
///
/// The plaintext is `digest ‖ 0xA4 ‖ fields ‖ 0xA4`, where `fields` is
/// `md5_origin ‖ 0xA4 ‖ "1" ‖ 0xA4 ‖ track_id ‖ 0xA4 ‖ media_version` and
/// `digest` is its MD5 digest. The plaintext is padded with `.` to a whole
/// number of AES blocks, encrypted with AES-128-ECB and hex-encoded into the
/// path. The host is picked by the first character of `md5_origin`.
///
/// # Errors
///
/// Returns a metadata error if `md5_origin` is empty, or an internal error if
/// the result is not a valid URL.
pub fn derive_url(
    url_key: &Key,
    md5_origin: &str,
    track_id: TrackId,
    media_version: &str,
) -> Result<Url> {
    let Some(host_char) = md5_origin.chars().next() else {
        return Err(Error::metadata(format!(
            "track {track_id} has no origin hash to derive a stream url from"
        )));
    };

    let mut fields = Vec::with_capacity(md5_origin.len() + 48);
    fields.extend_from_slice(md5_origin.as_bytes());
    fields.push(FIELD_SEPARATOR);
    fields.extend_from_slice(FORMAT_NUMBER);
    fields.push(FIELD_SEPARATOR);
    fields.extend_from_slice(track_id.to_string().as_bytes());
    fields.push(FIELD_SEPARATOR);
    fields.extend_from_slice(media_version.as_bytes());

    let digest = Md5::digest(&fields);

    let mut plain = Vec::with_capacity(digest.len() + fields.len() + AES_BLOCK_SIZE + 2);
    plain.extend_from_slice(&digest);
    plain.push(FIELD_SEPARATOR);
    plain.extend_from_slice(&fields);
    plain.push(FIELD_SEPARATOR);
    while plain.len() % AES_BLOCK_SIZE != 0 {
        plain.push(b'.');
    }

    let cipher = Aes128::new(GenericArray::from_slice(&**url_key));
    for block in plain.chunks_exact_mut(AES_BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }

    let url = format!(
        "https://e-cdns-proxy-{host_char}.dzcdn.net/mobile/1/{}",
        hex::encode(plain)
    );
    Url::parse(&url).map_err(|e| Error::internal(format!("derived stream url is invalid: {e}")))
}

/// Whether the stream at `url` is served encrypted.
#[must_use]
pub fn is_encrypted(url: &Url) -> bool {
    let path = url.path();
    path.contains("/mobile/") || path.contains("/media/")
}

/// Resolves the stream URL of a track at the best available quality.
///
/// # Errors
///
/// Returns an unavailable quality error when no tier at or below `requested`
/// has a file, a metadata error when the URL cannot be derived, or any
/// transport error from the gateway.
pub async fn resolve_stream(
    gateway: &Gateway,
    keys: &Keys,
    song: &SongData,
    requested: Quality,
) -> Result<ResolvedStream> {
    let quality = Quality::resolve(requested, song.file_sizes())?;
    if quality != requested {
        debug!("track {}: falling back from {requested} to {quality}", song.id);
    }

    let url = match gateway.list_data(&song.track_token).await? {
        Some(url) => {
            debug!("track {}: using direct media source", song.id);
            url
        }
        None => {
            debug!("track {}: deriving stream url", song.id);
            derive_url(&keys.url, &song.md5_origin, song.id, &song.media_version)?
        }
    };

    let encrypted = is_encrypted(&url);
    Ok(ResolvedStream {
        url,
        quality,
        encrypted,
    })
}

/// Downloads a complete stream into memory.
///
/// # Errors
///
/// Returns a download error if the CDN does not answer with a success status
/// or the transfer fails.
pub async fn download(client: &HttpClient, stream: &ResolvedStream) -> Result<Vec<u8>> {
    let request = client.get(stream.url.clone());
    let response = client.execute(request).await?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::download(format!(
            "stream download failed with HTTP {status}"
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::download(format!("stream download failed: {e}")))?;
    trace!("downloaded {} bytes", bytes.len());

    Ok(Vec::from(bytes))
}

#[cfg(test)]
mod tests {
    use aes::cipher::BlockDecrypt;

    use super::*;
    use crate::error::ErrorKind;

    const URL_KEY: Key = Key::new(*b"fedcba9876543210");

    fn track_id() -> TrackId {
        "3135556".parse().unwrap()
    }

    #[test]
    fn track_id_parsing() {
        assert_eq!(track_id().get(), 3_135_556);
        assert_eq!(" -42 ".parse::<TrackId>().unwrap().to_string(), "-42");
        for invalid in ["", "0", "abc", "12a"] {
            let err = invalid.parse::<TrackId>().unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidArgument, "{invalid:?}");
        }
    }

    const MD5_ORIGIN: &str = "51afcde9f56a132096c0496cc95eb24b";

    /// Reverses the path encryption of a derived URL.
    fn decrypt_path(url: &Url) -> Vec<u8> {
        let path = url.path().strip_prefix("/mobile/1/").unwrap();
        let mut plain = hex::decode(path).unwrap();
        assert_eq!(plain.len() % AES_BLOCK_SIZE, 0);

        let cipher = Aes128::new(GenericArray::from_slice(&*URL_KEY));
        for block in plain.chunks_exact_mut(AES_BLOCK_SIZE) {
            cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }
        plain
    }

    fn fields(media_version: &str) -> Vec<u8> {
        format!("{MD5_ORIGIN}\u{a4}1\u{a4}3135556\u{a4}{media_version}")
            .chars()
            .map(|c| c as u8)
            .collect()
    }

    #[test]
    fn derived_url_is_deterministic() {
        let first = derive_url(&URL_KEY, MD5_ORIGIN, track_id(), "8").unwrap();
        let second = derive_url(&URL_KEY, MD5_ORIGIN, track_id(), "8").unwrap();
        assert_eq!(first, second);

        let other = derive_url(&URL_KEY, MD5_ORIGIN, track_id(), "9").unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn derived_url_shape() {
        let url = derive_url(&URL_KEY, MD5_ORIGIN, track_id(), "8").unwrap();

        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("e-cdns-proxy-5.dzcdn.net"));
        assert!(is_encrypted(&url));

        let plain = decrypt_path(&url);
        let fields = fields("8");
        assert_eq!(&plain[..16], Md5::digest(&fields).as_slice());
        assert_eq!(plain[16], FIELD_SEPARATOR);
        assert_eq!(&plain[17..17 + fields.len()], fields.as_slice());
        assert_eq!(plain[17 + fields.len()], FIELD_SEPARATOR);
        assert!(plain[18 + fields.len()..].iter().all(|&b| b == b'.'));
    }

    #[test]
    fn media_version_is_not_renormalized() {
        let padded = derive_url(&URL_KEY, MD5_ORIGIN, track_id(), "08").unwrap();
        let plain = derive_url(&URL_KEY, MD5_ORIGIN, track_id(), "8").unwrap();
        assert_ne!(padded, plain);

        let decrypted = decrypt_path(&padded);
        let fields = fields("08");
        assert_eq!(&decrypted[17..17 + fields.len()], fields.as_slice());
    }

    #[test]
    fn empty_origin_cannot_derive() {
        let err = derive_url(&URL_KEY, "", track_id(), "8").unwrap_err();
        assert_eq!(err.kind, ErrorKind::DataLoss);
    }

    #[test]
    fn encrypted_paths() {
        for (url, encrypted) in [
            ("https://e-cdns-proxy-a.dzcdn.net/mobile/1/abcdef", true),
            ("https://cdnt-proxy.dzcdn.net/media/1/flac/abc", true),
            ("https://cdn.example.com/stream/preview.mp3", false),
        ] {
            assert_eq!(is_encrypted(&Url::parse(url).unwrap()), encrypted, "{url}");
        }
    }
}
