//! Station identity types.
//!
//! Every participant on the APRS network is named by a callsign, optionally
//! followed by an SSID (`KG5YOV-9`). The same identifier names the station
//! this gateway logs in as, the recipients of outbound messages and the
//! sources of inbound packets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Longest station identifier APRS messaging can address (addressee field width).
pub const MAX_CALLSIGN_LEN: usize = 9;

/// Longest SSID suffix accepted after the `-` separator.
const MAX_SSID_LEN: usize = 2;

// ---------------------------------------------------------------------------
// Callsign
// ---------------------------------------------------------------------------

/// A normalized station identifier: uppercase ASCII alphanumerics with an
/// optional `-SSID` suffix, at most [`MAX_CALLSIGN_LEN`] characters.
///
/// Parsing trims surrounding whitespace and uppercases the input, so
/// `" kg5yov-9 "` and `"KG5YOV-9"` name the same station.
///
/// # Examples
///
/// ```
/// use aprsbot_models::Callsign;
///
/// let call: Callsign = "kg5yov-9".parse().unwrap();
/// assert_eq!(call.to_string(), "KG5YOV-9");
/// assert_eq!(call.base(), "KG5YOV");
/// assert_eq!(call.ssid(), Some("9"));
///
/// assert!("".parse::<Callsign>().is_err());
/// assert!("KG5YOV-".parse::<Callsign>().is_err());
/// assert!("KG5/YOV".parse::<Callsign>().is_err());
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Callsign(String);

impl Callsign {
    /// Normalize and validate a station identifier.
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        let normalized = raw.trim().to_ascii_uppercase();
        Self::validate(&normalized)?;
        Ok(Self(normalized))
    }

    /// Return the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The callsign without its SSID suffix.
    pub fn base(&self) -> &str {
        self.0.split_once('-').map_or(self.0.as_str(), |(base, _)| base)
    }

    /// The SSID suffix, if any.
    pub fn ssid(&self) -> Option<&str> {
        self.0.split_once('-').map(|(_, ssid)| ssid)
    }

    fn validate(s: &str) -> Result<(), ModelError> {
        let invalid = |reason: &str| ModelError::InvalidCallsign {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        if s.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if s.len() > MAX_CALLSIGN_LEN {
            return Err(invalid("must be at most 9 characters"));
        }

        let (base, ssid) = match s.split_once('-') {
            Some((base, ssid)) => (base, Some(ssid)),
            None => (s, None),
        };

        if base.is_empty() || !base.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(invalid("must start with ASCII letters or digits"));
        }
        if let Some(ssid) = ssid
            && (ssid.is_empty()
                || ssid.len() > MAX_SSID_LEN
                || !ssid.bytes().all(|b| b.is_ascii_alphanumeric()))
        {
            return Err(invalid("SSID must be 1 or 2 ASCII letters or digits"));
        }
        Ok(())
    }
}

impl fmt::Display for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Callsign {
    type Error = ModelError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Callsign {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl FromStr for Callsign {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Callsign {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
