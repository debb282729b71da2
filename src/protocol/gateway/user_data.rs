//! User data from the gateway, used to validate a session.
//!
//! # Wire Format
//!
//! ```json
//! {
//!     "USER": {
//!         "USER_ID": "123456789",
//!         "BLOG_NAME": "Username"
//!     },
//!     "checkForm": "api_token"
//! }
//! ```
//!
//! For an invalid or expired credential the gateway still answers, but with
//! `USER_ID` set to the integer `0` and other string fields as integers too.
//! Parsing is lenient so that case surfaces as a zero user ID.

use serde::Deserialize;
use serde_with::{serde_as, DefaultOnError, DisplayFromStr, PickFirst};
use veil::Redact;

use super::Method;

impl Method for UserData {
    const METHOD: &'static str = "deezer.getUserData";
}

/// User data of the account that the credential belongs to.
#[serde_as]
#[derive(Clone, Default, Eq, PartialEq, Deserialize, Redact, Hash)]
pub struct UserData {
    /// User profile
    #[serde(default)]
    #[serde(rename = "USER")]
    pub user: User,

    /// CSRF-style form token, sent as `api_token` on later calls.
    #[serde(default)]
    #[serde(rename = "checkForm")]
    #[serde_as(as = "DefaultOnError")]
    #[redact]
    pub api_token: String,
}

/// User profile.
#[serde_as]
#[derive(Clone, Default, Eq, PartialEq, Deserialize, Debug, Hash)]
pub struct User {
    /// Unique user identifier; zero when not logged in.
    #[serde(default)]
    #[serde(rename = "USER_ID")]
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    pub id: u64,

    /// Display name
    #[serde(default)]
    #[serde(rename = "BLOG_NAME")]
    #[serde_as(as = "DefaultOnError")]
    pub name: String,
}
