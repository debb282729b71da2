//! Audio formats and quality tiers.
//!
//! The provider stores each track in up to three formats. Each format has a
//! numeric code on the wire and its own file size in the gateway metadata,
//! where a size of zero means the format is not available for that track.
//!
//! | Tier | [`Quality`] | [`Format`] | Code | MIME type    |
//! |------|-------------|------------|------|--------------|
//! | 0    | `Basic`     | `MP3_128`  | 1    | `audio/mpeg` |
//! | 1    | `High`      | `MP3_320`  | 3    | `audio/mpeg` |
//! | 2    | `Lossless`  | `FLAC`     | 9    | `audio/flac` |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Audio format, mapped to the numeric IDs of the protocol.
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize, Debug, Hash)]
#[expect(non_camel_case_types)]
#[repr(i64)]
pub enum Format {
    /// 128 kbps MP3 (1, default)
    #[default]
    MP3_128 = 1,
    /// 320 kbps MP3 (3)
    MP3_320 = 3,
    /// FLAC lossless (9)
    FLAC = 9,
}

impl Format {
    /// MIME type of the audio served in this format.
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::FLAC => "audio/flac",
            Self::MP3_128 | Self::MP3_320 => "audio/mpeg",
        }
    }
}

impl fmt::Display for Format {
    /// Shows the format name (e.g., "`MP3_320`", "FLAC").
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Quality tier as requested by callers, from 0 (compressed) to 2
/// (lossless).
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
#[repr(u8)]
pub enum Quality {
    /// 128 kbps MP3
    Basic = 0,
    /// 320 kbps MP3
    High = 1,
    /// FLAC
    #[default]
    Lossless = 2,
}

impl Quality {
    /// All tiers from lowest to highest.
    pub const ALL: [Quality; 3] = [Self::Basic, Self::High, Self::Lossless];

    #[must_use]
    pub fn index(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn format(self) -> Format {
        match self {
            Self::Basic => Format::MP3_128,
            Self::High => Format::MP3_320,
            Self::Lossless => Format::FLAC,
        }
    }

    /// Picks the best available tier at or below `requested`.
    ///
    /// Starting at `requested`, steps down one tier at a time for as long as
    /// the current tier has no file and is not the lowest tier. `sizes` holds
    /// the file size per tier, indexed by [`Quality::index`].
    ///
    /// # Errors
    ///
    /// Returns an unavailable quality error when the tier this lands on has
    /// no file either, which can only happen when every tier at or below
    /// `requested` has size zero.
    pub fn resolve(requested: Self, sizes: [u64; 3]) -> Result<Self> {
        let mut index = usize::from(requested.index());
        while sizes[index] == 0 && index > 0 {
            index -= 1;
        }

        if sizes[index] == 0 {
            return Err(Error::unavailable_quality(format!(
                "no quality tier available at or below {requested}"
            )));
        }

        Ok(Self::ALL[index])
    }
}

impl TryFrom<u8> for Quality {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| Error::invalid_argument("Invalid quality"))
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.index(), self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn falls_back_to_compressed() {
        let quality = Quality::resolve(Quality::Lossless, [3_000_000, 0, 0]).unwrap();
        assert_eq!(quality, Quality::Basic);
        assert_eq!(quality.format(), Format::MP3_128);
    }

    #[test]
    fn keeps_requested_when_available() {
        let quality =
            Quality::resolve(Quality::Lossless, [3_000_000, 7_500_000, 25_000_000]).unwrap();
        assert_eq!(quality, Quality::Lossless);
        assert_eq!(quality.format(), Format::FLAC);
    }

    #[test]
    fn stops_at_first_available_tier() {
        let quality = Quality::resolve(Quality::Lossless, [3_000_000, 7_500_000, 0]).unwrap();
        assert_eq!(quality, Quality::High);
    }

    #[test]
    fn never_steps_up() {
        let err = Quality::resolve(Quality::Basic, [0, 7_500_000, 25_000_000]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OutOfRange);
    }

    #[test]
    fn all_tiers_unavailable() {
        let err = Quality::resolve(Quality::Lossless, [0, 0, 0]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OutOfRange);
    }

    #[test]
    fn parses_tier_index() {
        assert_eq!(Quality::try_from(0).unwrap(), Quality::Basic);
        assert_eq!(Quality::try_from(2).unwrap(), Quality::Lossless);
        assert!(Quality::try_from(3).is_err());
        assert_eq!(Quality::default(), Quality::Lossless);
    }

    #[test]
    fn mime_types() {
        assert_eq!(Format::FLAC.mime_type(), "audio/flac");
        assert_eq!(Format::MP3_320.mime_type(), "audio/mpeg");
        assert_eq!(Format::FLAC.to_string(), "FLAC");
    }
}
