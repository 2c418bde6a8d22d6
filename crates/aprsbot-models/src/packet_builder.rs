//! # Outbound packet builder
//!
//! Fluent builder for the two packets this gateway originates: numbered
//! text messages and acknowledgements. Both share one header shape:
//!
//! ```text
//! SOURCE>APZMNT,TCPIP::RECIPIENT:test message{1
//! SOURCE>APZMNT,TCPIP::RECIPIENT:ack17
//! ```
//!
//! where `RECIPIENT` is left-justified and space padded (or truncated) to
//! exactly nine characters.
//!
//! ## Quick examples
//!
//! ```rust
//! use aprsbot_models::{Callsign, MessageId, PacketBuilder};
//!
//! let station = Callsign::parse("W1AW").unwrap();
//! let recipient = Callsign::parse("KG5YOV").unwrap();
//!
//! let packet = PacketBuilder::from(&station)
//!     .to(&recipient)
//!     .message("test message", MessageId::FIRST)
//!     .build()
//!     .unwrap();
//! assert_eq!(packet.to_string(), "W1AW>APZMNT,TCPIP::KG5YOV   :test message{1");
//!
//! let ack = PacketBuilder::from(&station)
//!     .to(&recipient)
//!     .ack("17")
//!     .build()
//!     .unwrap();
//! assert_eq!(ack.to_string(), "W1AW>APZMNT,TCPIP::KG5YOV   :ack17");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::message::MessageId;
use crate::station::Callsign;

/// Destination (TOCALL) stamped on every packet this gateway originates.
///
/// `APZ` is the experimental software range.
pub const DEFAULT_TOCALL: &str = "APZMNT";

/// Path used for packets injected over APRS-IS.
const TCPIP_PATH: &str = "TCPIP";

// ─── OutboundPacket ──────────────────────────────────────────────────

/// Body of a packet originated by this gateway.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum OutboundBody {
    /// A numbered text message that expects an acknowledgement.
    Message {
        /// Message text (validated by the caller).
        text: String,
        /// Sequence number assigned by the dispatcher.
        id: MessageId,
    },
    /// Acknowledgement of a message another station sent us, echoing its id.
    Ack(String),
}

/// A fully addressed packet ready to go on the wire.
///
/// [`fmt::Display`] renders the exact APRS-IS line (without line ending).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OutboundPacket {
    /// Station sending the packet (the gateway's login callsign).
    pub source: Callsign,
    /// Destination (TOCALL) field.
    pub tocall: String,
    /// Station the message is addressed to.
    pub recipient: Callsign,
    /// Message or acknowledgement body.
    pub body: OutboundBody,
}

impl fmt::Display for OutboundPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}>{},{TCPIP_PATH}::{:<9.9}:",
            self.source,
            self.tocall,
            self.recipient.as_str()
        )?;
        match &self.body {
            OutboundBody::Message { text, id } => write!(f, "{text}{{{id}"),
            OutboundBody::Ack(id) => write!(f, "ack{id}"),
        }
    }
}

// ─── PacketBuilder ───────────────────────────────────────────────────

/// Builder for [`OutboundPacket`]s.
///
/// Created via [`PacketBuilder::from`].
pub struct PacketBuilder {
    source: Callsign,
    tocall: String,
    recipient: Option<Callsign>,
    body: Option<OutboundBody>,
}

impl PacketBuilder {
    /// Start a packet sent by `source`.
    pub fn from(source: &Callsign) -> Self {
        Self {
            source: source.clone(),
            tocall: DEFAULT_TOCALL.to_string(),
            recipient: None,
            body: None,
        }
    }

    /// Override the destination (TOCALL) field.
    pub fn tocall(mut self, tocall: impl Into<String>) -> Self {
        self.tocall = tocall.into();
        self
    }

    /// Set the station the packet is addressed to.
    pub fn to(mut self, recipient: &Callsign) -> Self {
        self.recipient = Some(recipient.clone());
        self
    }

    /// Numbered text message.
    pub fn message(mut self, text: impl Into<String>, id: MessageId) -> Self {
        self.body = Some(OutboundBody::Message {
            text: text.into(),
            id,
        });
        self
    }

    /// Acknowledgement echoing the sender's message number.
    pub fn ack(mut self, message_id: impl Into<String>) -> Self {
        self.body = Some(OutboundBody::Ack(message_id.into()));
        self
    }

    /// Consume the builder.
    ///
    /// # Errors
    ///
    /// [`ModelError::MissingField`] if no recipient or body was set.
    pub fn build(self) -> Result<OutboundPacket, ModelError> {
        let recipient = self.recipient.ok_or_else(|| ModelError::MissingField {
            field: "recipient".to_string(),
        })?;
        let body = self.body.ok_or_else(|| ModelError::MissingField {
            field: "body".to_string(),
        })?;
        Ok(OutboundPacket {
            source: self.source,
            tocall: self.tocall,
            recipient,
            body,
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
