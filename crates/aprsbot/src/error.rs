//! Error types for the bot.
//!
//! * [`ValidationError`] – a send request that was refused before anything
//!   reached the network.
//! * [`ConstructionError`] – a command that could not be built at startup;
//!   the registry logs it and carries on without that command.
//! * [`ConfigError`] – a malformed environment variable.

use aprsbot_link::LinkError;

/// Why a send request was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No recipient was given.
    #[error("no recipient given")]
    EmptyRecipient,

    /// The recipient is not a valid station identifier.
    #[error("{0} is not a valid callsign")]
    InvalidRecipient(String),

    /// No message text was given.
    #[error("no message text given")]
    EmptyMessage,

    /// The text exceeds the APRS message limit.
    #[error("message is {len} bytes, the limit is {max}")]
    MessageTooLong {
        /// Length of the rejected text in bytes.
        len: usize,
        /// The limit.
        max: usize,
    },

    /// The text contains a character that breaks message framing.
    #[error("message contains forbidden character {0:?}")]
    ForbiddenCharacter(char),

    /// The text contains a control character such as a line break.
    #[error("message contains control character {0:?}")]
    ControlCharacter(char),
}

/// Why a command could not be constructed.
#[derive(Debug, thiserror::Error)]
pub enum ConstructionError {
    /// A required credential is not set.
    #[error("missing credentials: {0} is not set")]
    MissingCredentials(String),

    /// The command needs configuration that was not provided.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// The command was switched off for this run.
    #[error("disabled: {0}")]
    Disabled(String),

    /// The packet network could not be reached.
    #[error("APRS-IS unavailable: {0}")]
    Link(LinkError),
}

impl From<LinkError> for ConstructionError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::MissingCredentials(var) => Self::MissingCredentials(var),
            other => Self::Link(other),
        }
    }
}

/// A malformed configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The variable is set but cannot be parsed.
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        /// Environment variable name.
        var: String,
        /// The raw value.
        value: String,
        /// What was expected.
        reason: String,
    },

    /// Only one of a pair of related variables is set.
    #[error("{set} is set but {missing} is not")]
    Incomplete {
        /// The variable that is set.
        set: String,
        /// The variable that is missing.
        missing: String,
    },
}
