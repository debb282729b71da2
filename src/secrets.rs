//! Secret store for the credential and the provider's fixed keys.
//!
//! Secrets live in a TOML file outside of the binary:
//!
//! ```toml
//! arl = "..."        # long-lived credential
//! bf_secret = "..."  # 16 bytes, track key derivation secret
//! url_key = "..."    # 16 bytes, CDN path encryption key
//! ```
//!
//! The keys are loaded once at startup and injected into the engine as
//! [`Keys`]. The credential is looked up through a [`CredentialStore`] on
//! every request instead, so a rotated credential is picked up without a
//! restart.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use veil::Redact;

use crate::{
    arl::Arl,
    decrypt::Key,
    error::{Error, Result},
};

/// Largest secrets file that will be read.
const MAX_FILE_SIZE: u64 = 4 * 1024;

/// The provider's fixed keys.
///
/// Immutable for the lifetime of the process.
#[derive(Copy, Clone, Redact, PartialEq, Eq, Hash)]
pub struct Keys {
    /// Secret that per-track Blowfish keys are derived from.
    #[redact]
    pub blowfish: Key,

    /// AES key that derived CDN paths are encrypted with.
    #[redact]
    pub url: Key,
}

/// On-disk format of the secrets file.
#[derive(Clone, Deserialize, Redact)]
struct SecretsToml {
    #[redact]
    arl: Option<String>,
    #[redact]
    bf_secret: Option<String>,
    #[redact]
    url_key: Option<String>,
}

impl SecretsToml {
    fn from_file(path: &Path) -> Result<Self> {
        // Prevent out-of-memory condition: secrets files should be small.
        let file_size = fs::metadata(path)?.len();
        if file_size > MAX_FILE_SIZE {
            return Err(Error::configuration(format!(
                "{} is too large",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| {
            Error::configuration(format!("{} format is invalid: {e}", path.display()))
        })
    }

    fn keys(&self) -> Result<Keys> {
        let parse = |name: &str, value: Option<&String>| -> Result<Key> {
            value
                .ok_or_else(|| Error::configuration(format!("{name} not configured")))?
                .parse::<Key>()
                .map_err(|e| Error::configuration(format!("{name}: {}", e.error)))
        };

        Ok(Keys {
            blowfish: parse("bf_secret", self.bf_secret.as_ref())?,
            url: parse("url_key", self.url_key.as_ref())?,
        })
    }

    fn arl(&self) -> Result<Option<Arl>> {
        self.arl
            .as_deref()
            .map(str::trim)
            .filter(|arl| !arl.is_empty())
            .map(str::parse::<Arl>)
            .transpose()
    }
}

/// Loads the provider keys from a secrets file.
///
/// # Errors
///
/// Returns a configuration error if the file cannot be read or parsed, or if
/// either key is missing or not exactly 16 bytes long.
pub fn load_keys(path: impl AsRef<Path>) -> Result<Keys> {
    SecretsToml::from_file(path.as_ref())?.keys()
}

/// Source of the credential for a request.
pub trait CredentialStore: Send + Sync {
    /// Returns the current credential, or `None` when none is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the store itself cannot be read.
    fn credential(&self) -> Result<Option<Arl>>;
}

/// Credential store backed by the secrets file, read on every lookup.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SecretsFile {
    path: PathBuf,
}

impl SecretsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for SecretsFile {
    fn credential(&self) -> Result<Option<Arl>> {
        SecretsToml::from_file(&self.path)?.arl()
    }
}

/// Credential store with a fixed credential, e.g. from the command line.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StaticCredential(pub Option<Arl>);

impl CredentialStore for StaticCredential {
    fn credential(&self) -> Result<Option<Arl>> {
        Ok(self.0.clone())
    }
}
