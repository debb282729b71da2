//! Gateway API types for the provider's private RPC endpoint.
//!
//! This module provides type-safe interfaces to the gateway methods used to
//! resolve a track:
//! * Session validation ([`user_data`])
//! * Per-track file metadata ([`song_data`])
//! * Direct media sources ([`list_data`])
//!
//! # Number Handling
//!
//! The gateway is inconsistent about numbers: the same field can arrive as
//! a JSON number in one response and as a numeric string in the next.
//! Numeric fields are therefore parsed leniently.
//!
//! # Response Envelope
//!
//! ```json
//! {
//!     "error": [],
//!     "results": { ... }
//! }
//! ```
//!
//! `error` is an empty array on success and an object keyed by error type
//! on failure, in which case `results` is usually absent or empty.

pub mod list_data;
pub mod song_data;
pub mod user_data;

pub use list_data::ListData;
pub use song_data::SongData;
pub use user_data::UserData;

use serde::{de::DeserializeOwned, Deserialize};

use crate::error::{Error, Result};

/// Defines a gateway API method identifier.
///
/// Each type implementing this trait represents the results of a specific
/// gateway endpoint, identified by a method name string.
pub trait Method {
    /// The gateway API method name, in dot-notation (e.g.
    /// "deezer.getUserData").
    const METHOD: &'static str;
}

/// Envelope of every gateway response.
///
/// `results` is kept as raw JSON until the envelope has been checked, so an
/// error response with empty `results` is reported as such instead of as a
/// deserialization failure.
#[derive(Clone, PartialEq, Deserialize, Debug, Default)]
pub struct Response {
    /// API status information
    #[serde(default)]
    pub error: serde_json::Value,

    /// Method-specific results
    #[serde(default)]
    pub results: Option<serde_json::Value>,
}

impl Response {
    /// Whether the gateway reported an error.
    #[must_use]
    pub fn has_error(&self) -> bool {
        match &self.error {
            serde_json::Value::Null => false,
            serde_json::Value::Array(errors) => !errors.is_empty(),
            serde_json::Value::Object(errors) => !errors.is_empty(),
            serde_json::Value::String(error) => !error.is_empty(),
            _ => true,
        }
    }

    /// Checks the envelope and deserializes the results of method `T`.
    ///
    /// # Errors
    ///
    /// Returns a metadata error if:
    /// * the response has no `results` field
    /// * the gateway reported an error
    /// * the results don't match the shape of `T`
    pub fn into_results<T>(self) -> Result<T>
    where
        T: Method + DeserializeOwned,
    {
        let has_error = self.has_error();
        let Some(results) = self.results.filter(|results| !results.is_null()) else {
            return Err(Error::metadata(format!(
                "{}: response has no results ({})",
                T::METHOD,
                self.error
            )));
        };

        if has_error {
            return Err(Error::metadata(format!("{}: {}", T::METHOD, self.error)));
        }

        serde_json::from_value(results)
            .map_err(|e| Error::metadata(format!("{}: malformed results: {e}", T::METHOD)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[derive(Deserialize, Debug)]
    struct Echo {
        value: u64,
    }

    impl Method for Echo {
        const METHOD: &'static str = "test.echo";
    }

    #[test]
    fn unwraps_results() {
        let response: Response =
            serde_json::from_str(r#"{"error": [], "results": {"value": 7}}"#).unwrap();
        assert!(!response.has_error());
        assert_eq!(response.into_results::<Echo>().unwrap().value, 7);
    }

    #[test]
    fn missing_results_is_metadata_error() {
        let response: Response = serde_json::from_str(r#"{"error": []}"#).unwrap();
        let err = response.into_results::<Echo>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::DataLoss);
        assert!(err.to_string().contains("no results"));
    }

    #[test]
    fn reported_error_wins_over_empty_results() {
        let response: Response = serde_json::from_str(
            r#"{"error": {"DATA_ERROR": "song_id"}, "results": {}}"#,
        )
        .unwrap();
        assert!(response.has_error());
        let err = response.into_results::<Echo>().unwrap_err();
        assert!(err.to_string().contains("DATA_ERROR"));
    }

    #[test]
    fn reported_error_without_results_names_both() {
        let response: Response = serde_json::from_str(
            r#"{"error": {"VALID_TOKEN_REQUIRED": "invalid api token"}, "results": null}"#,
        )
        .unwrap();
        let err = response.into_results::<Echo>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::DataLoss);
        let message = err.to_string();
        assert!(message.contains("no results"), "{message}");
        assert!(message.contains("VALID_TOKEN_REQUIRED"), "{message}");
    }
}
