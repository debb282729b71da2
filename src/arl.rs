//! The long-lived provider credential.
//!
//! An ARL is the cookie the provider sets after logging in on the web. It is
//! treated as an opaque secret: this crate never inspects or refreshes it, it
//! only presents it to the gateway as the `arl` cookie.

use std::{fmt, str::FromStr};

use veil::Redact;

use crate::error::{Error, Result};

/// Opaque, long-lived credential granting access to the gateway API.
///
/// `Debug` output is redacted so the value can be logged as part of other
/// structures without leaking it.
#[derive(Clone, Redact, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[redact(all)]
pub struct Arl(String);

impl Arl {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Arl {
    type Err = Error;

    /// Parses a credential, rejecting values that cannot be sent as a cookie.
    ///
    /// Leading and trailing whitespace is trimmed, as credentials are often
    /// pasted from a browser.
    fn from_str(s: &str) -> Result<Self> {
        let arl = s.trim();
        if arl.is_empty() {
            return Err(Error::configuration("arl is empty"));
        }

        // Cookie values cannot contain control characters, whitespace,
        // double quotes, commas, semicolons or backslashes.
        let illegal = |chr: char| {
            chr.is_ascii_control()
                || chr.is_whitespace()
                || matches!(chr, '"' | ',' | ';' | '\\')
                || !chr.is_ascii()
        };
        if arl.contains(illegal) {
            return Err(Error::configuration("arl contains illegal characters"));
        }

        Ok(Self(arl.to_owned()))
    }
}

/// Formats the raw credential, for use in a `Cookie` header only.
impl fmt::Display for Arl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
