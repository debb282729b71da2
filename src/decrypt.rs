//! Track decryption for the provider's protected media content.
//!
//! # Encryption Format
//!
//! The provider uses a striped encryption pattern:
//! * Content is divided into 2KB blocks
//! * Every third block is encrypted, starting with the first
//! * A trailing block shorter than 2KB is never encrypted
//! * Encryption uses Blowfish in CBC mode with a fixed IV
//! * Cipher state is reset for every encrypted block
//!
//! Put differently: the stream is a sequence of 6KB super-blocks of which
//! only the first 2KB is ciphertext. Decryption therefore never changes the
//! length of the stream.
//!
//! # Security
//!
//! No decryption keys are included in this code. The secret that track keys
//! are derived from must be provided externally, see [`crate::secrets`].
//!
//! # Examples
//!
//! ```rust
//! use dzgate::{
//!     decrypt::{self, Key},
//!     error::Result,
//!     track::TrackId,
//! };
//!
//! fn decrypt_track(track_id: TrackId, secret: &Key, bytes: &mut [u8]) -> Result<()> {
//!     let key = decrypt::key_for_track_id(track_id, secret);
//!     decrypt::decrypt_in_place(bytes, &key)
//! }
//! ```

use std::{ops::Deref, str::FromStr};

use blowfish::{
    cipher::{BlockDecryptMut, KeyIvInit},
    Blowfish,
};
use cbc::cipher::block_padding::NoPadding;
use md5::{Digest, Md5};
use veil::Redact;

use crate::{
    error::{Error, Result},
    track::TrackId,
};

/// Length of decryption keys in bytes.
pub const KEY_LENGTH: usize = 16;

/// Raw key bytes.
pub type RawKey = [u8; KEY_LENGTH];

/// Fixed IV for CBC decryption.
pub const CBC_BF_IV: &[u8; 8] = b"\x00\x01\x02\x03\x04\x05\x06\x07";

/// Size of each block in bytes (2KB).
pub const CBC_BLOCK_SIZE: usize = 2 * 1024;

/// Number of blocks in a stripe (3).
///
/// Every third block is encrypted.
pub const CBC_STRIPE_COUNT: usize = 3;

/// Size of a super-block: one encrypted block followed by two plain blocks.
pub const SUPER_BLOCK_SIZE: usize = CBC_BLOCK_SIZE * CBC_STRIPE_COUNT;

/// Validated 16-byte key.
///
/// Used both for the externally provided secrets and for the per-track keys
/// derived from them. `Debug` output is redacted.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Redact)]
#[redact(all)]
pub struct Key(RawKey);

impl Key {
    #[must_use]
    pub const fn new(raw: RawKey) -> Self {
        Self(raw)
    }
}

impl FromStr for Key {
    type Err = Error;

    /// Parses a string into a key.
    ///
    /// # Errors
    ///
    /// Returns `Error::OutOfRange` if the string isn't exactly 16 bytes long.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let len = s.len();
        if len != KEY_LENGTH {
            return Err(Error::new(
                crate::error::ErrorKind::OutOfRange,
                format!("key length is {len} but should be {KEY_LENGTH}"),
            ));
        }

        let mut key = RawKey::default();
        key.copy_from_slice(s.as_bytes());

        Ok(Self(key))
    }
}

impl Deref for Key {
    type Target = RawKey;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Calculates the track-specific decryption key.
///
/// The key is the XOR of three 16-byte values:
/// 1. the first half of the hexadecimal MD5 digest of the track ID
/// 2. the second half of that same digest
/// 3. the secret
///
/// This is a pure function: the same track ID and secret always produce the
/// same key.
#[must_use]
pub fn key_for_track_id(track_id: TrackId, salt: &Key) -> Key {
    let track_hash = format!("{:x}", Md5::digest(track_id.to_string()));
    let track_hash = track_hash.as_bytes();

    let mut key = RawKey::default();
    for i in 0..KEY_LENGTH {
        key[i] = track_hash[i] ^ track_hash[i + KEY_LENGTH] ^ salt[i];
    }
    Key(key)
}

/// Decrypts one 2KB block in place with a fresh cipher state.
///
/// # Errors
///
/// Returns a decryption error if the block is not a multiple of the
/// Blowfish block size.
fn decrypt_block(block: &mut [u8], key: &Key) -> Result<()> {
    let cipher = cbc::Decryptor::<Blowfish>::new_from_slices(&**key, CBC_BF_IV)
        .map_err(|e| Error::decryption(e.to_string()))?;

    // No padding: callers only pass full 2KB blocks.
    cipher
        .decrypt_padded_mut::<NoPadding>(block)
        .map_err(|e| Error::decryption(e.to_string()))?;

    Ok(())
}

/// Decrypts a complete striped stream in place.
///
/// For every super-block, decrypts the first 2KB when the super-block holds
/// at least that many bytes. Everything else is left untouched, so the
/// buffer length never changes.
///
/// # Errors
///
/// Returns a decryption error if the cipher cannot be initialized or run.
pub fn decrypt_in_place(buffer: &mut [u8], key: &Key) -> Result<()> {
    for super_block in buffer.chunks_mut(SUPER_BLOCK_SIZE) {
        if super_block.len() >= CBC_BLOCK_SIZE {
            decrypt_block(&mut super_block[..CBC_BLOCK_SIZE], key)?;
        }
    }

    Ok(())
}
