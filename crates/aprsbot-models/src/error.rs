//! Error types for the `aprsbot-models` crate.
//!
//! All fallible constructors, parsers and builders in this crate return
//! variants of [`ModelError`].

/// Errors produced when constructing, parsing or validating model types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// A station callsign was empty or contained invalid characters.
    #[error("invalid callsign \"{value}\": {reason}")]
    InvalidCallsign {
        /// The value that failed validation.
        value: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// A message id was not a number in the issued range.
    #[error("invalid message id \"{value}\": {reason}")]
    InvalidMessageId {
        /// The value that failed validation.
        value: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// An APRS-IS line could not be decoded into a packet.
    #[error("malformed packet \"{line}\": {reason}")]
    MalformedPacket {
        /// The raw line as received.
        line: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// A required field was missing during packet construction.
    #[error("missing required field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },
}
