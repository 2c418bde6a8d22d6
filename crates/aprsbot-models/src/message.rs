//! APRS message types.
//!
//! An APRS message is a packet whose payload names an addressee and carries
//! either free text (optionally numbered so the recipient can acknowledge
//! it) or a response (`ack` / `rej`) referencing an earlier message number.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::station::Callsign;

/// Longest message text APRS allows in a single message packet.
pub const MAX_MESSAGE_LEN: usize = 67;

/// Longest message number the APRS message format carries.
const MAX_WIRE_ID_LEN: usize = 5;

// ---------------------------------------------------------------------------
// MessageId
// ---------------------------------------------------------------------------

/// Sequence number this gateway assigns to outbound messages (1–999 cyclic).
///
/// Zero is never issued; after [`MessageId::MAX`] the sequence wraps back to
/// [`MessageId::FIRST`].
///
/// # Examples
///
/// ```
/// use aprsbot_models::MessageId;
///
/// let first = MessageId::FIRST;
/// assert_eq!(first.value(), 1);
/// assert_eq!(first.next().value(), 2);
/// assert_eq!(MessageId::MAX.next(), MessageId::FIRST);
///
/// let parsed: MessageId = "042".parse().unwrap();
/// assert_eq!(parsed.value(), 42);
/// assert!("0".parse::<MessageId>().is_err());
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u16);

impl MessageId {
    /// The first id issued in a session.
    pub const FIRST: MessageId = MessageId(1);
    /// The last id before the sequence wraps.
    pub const MAX: MessageId = MessageId(999);

    /// Build an id from a raw number, rejecting values outside `1..=999`.
    pub fn new(value: u16) -> Result<Self, ModelError> {
        if (Self::FIRST.0..=Self::MAX.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ModelError::InvalidMessageId {
                value: value.to_string(),
                reason: "must be a number between 1 and 999".to_string(),
            })
        }
    }

    /// The numeric value.
    pub fn value(self) -> u16 {
        self.0
    }

    /// The id following this one, wrapping from 999 back to 1.
    pub fn next(self) -> Self {
        if self.0 >= Self::MAX.0 {
            Self::FIRST
        } else {
            Self(self.0 + 1)
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u16 = s.parse().map_err(|_| ModelError::InvalidMessageId {
            value: s.to_string(),
            reason: "must be a number between 1 and 999".to_string(),
        })?;
        Self::new(value).map_err(|_| ModelError::InvalidMessageId {
            value: s.to_string(),
            reason: "must be a number between 1 and 999".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// MessageBody
// ---------------------------------------------------------------------------

/// What an APRS message carries after the addressee field.
///
/// Ids are kept as the raw wire strings: other stations number their
/// messages however they like (`"12"`, `"AB3"`, …) and an acknowledgement
/// must echo the id exactly as it was sent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum MessageBody {
    /// Free text, numbered when the sender wants an acknowledgement.
    Text {
        /// The message text.
        text: String,
        /// The sender's message number, if any.
        message_id: Option<String>,
    },
    /// Positive acknowledgement of an earlier message number.
    Ack(String),
    /// Rejection of an earlier message number.
    Rej(String),
}

impl MessageBody {
    /// Decode the text that follows `:ADDRESSEE:` in a message packet.
    ///
    /// `ackNNN` / `rejNNN` with a 1–5 character alphanumeric id are
    /// responses. Anything else is text, with an optional trailing `{NNN`
    /// message number. A reply-ack suffix (`{NN}AA`) is stripped down to
    /// the message number.
    pub fn parse(body: &str) -> Self {
        if let Some(id) = body.strip_prefix("ack").and_then(wire_id) {
            return Self::Ack(id);
        }
        if let Some(id) = body.strip_prefix("rej").and_then(wire_id) {
            return Self::Rej(id);
        }
        if let Some((text, id)) = body.rsplit_once('{')
            && let Some(id) = wire_id(id)
        {
            return Self::Text {
                text: text.to_string(),
                message_id: Some(id),
            };
        }
        Self::Text {
            text: body.to_string(),
            message_id: None,
        }
    }

    /// `true` for `ack` and `rej` bodies.
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Ack(_) | Self::Rej(_))
    }
}

/// Extract a message number, dropping any reply-ack suffix after `}`.
fn wire_id(raw: &str) -> Option<String> {
    let id = raw.split('}').next().unwrap_or_default().trim_end();
    if id.is_empty()
        || id.len() > MAX_WIRE_ID_LEN
        || !id.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(id.to_string())
}

// ---------------------------------------------------------------------------
// AprsMessage
// ---------------------------------------------------------------------------

/// A decoded APRS message payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AprsMessage {
    /// The station the message is addressed to.
    pub addressee: Callsign,
    /// Text or response carried by the message.
    pub body: MessageBody,
}

impl AprsMessage {
    /// Returns `true` if this message is addressed to `station`.
    pub fn is_addressed_to(&self, station: &Callsign) -> bool {
        self.addressee == *station
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
