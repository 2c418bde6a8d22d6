//! APRS-IS login credentials.

use std::fmt;

use aprsbot_models::Callsign;

use crate::error::LinkError;

/// Environment variable holding the station callsign.
pub const CALLSIGN_VAR: &str = "APRS_CALLSIGN";
/// Environment variable holding the APRS-IS passcode.
pub const PASSWORD_VAR: &str = "APRS_PASSWORD";

/// Station identity and passcode used to log in to APRS-IS.
///
/// * `callsign` – the station packets are sent as; acknowledgements
///   addressed to it are correlated with pending messages.
/// * `passcode` – APRS-IS passcode. Without a verified passcode the
///   server drops everything the station transmits.
#[derive(Clone)]
pub struct AprsCredentials {
    /// Login callsign.
    pub callsign: Callsign,
    passcode: String,
}

impl AprsCredentials {
    /// Build credentials, normalizing the callsign.
    pub fn new(callsign: &str, passcode: impl Into<String>) -> Result<Self, LinkError> {
        let passcode = passcode.into();
        if passcode.trim().is_empty() {
            return Err(LinkError::MissingCredentials(PASSWORD_VAR.to_string()));
        }
        Ok(Self {
            callsign: Callsign::parse(callsign)?,
            passcode,
        })
    }

    /// Read `APRS_CALLSIGN` and `APRS_PASSWORD` from the environment.
    ///
    /// # Errors
    ///
    /// [`LinkError::MissingCredentials`] naming the first unset variable,
    /// or a model error if the callsign is malformed.
    pub fn from_env() -> Result<Self, LinkError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LinkError> {
        let callsign = lookup(CALLSIGN_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| LinkError::MissingCredentials(CALLSIGN_VAR.to_string()))?;
        let passcode = lookup(PASSWORD_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| LinkError::MissingCredentials(PASSWORD_VAR.to_string()))?;
        Self::new(&callsign, passcode)
    }

    /// The passcode sent in the login line.
    pub fn passcode(&self) -> &str {
        &self.passcode
    }
}

impl fmt::Debug for AprsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AprsCredentials")
            .field("callsign", &self.callsign)
            .field("passcode", &"<redacted>")
            .finish()
    }
}
