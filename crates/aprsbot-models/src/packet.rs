//! Inbound APRS-IS packet decoding.
//!
//! APRS-IS delivers one packet per line in TNC2 monitor format:
//!
//! ```text
//! SOURCE>DEST,PATH1,PATH2:payload
//! KG5YOV>APDR16,TCPIP*,qAC,T2TEXAS::W1AW     :ack1
//! ```
//!
//! Lines starting with `#` are server comments (login responses,
//! keepalives) and are not packets. Only the message payload type is
//! decoded further; every other payload is kept raw as
//! [`PacketPayload::Other`].

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::message::{AprsMessage, MessageBody};
use crate::station::{Callsign, MAX_CALLSIGN_LEN};

/// Data type identifier that introduces a message payload.
const MESSAGE_DTI: char = ':';

// ---------------------------------------------------------------------------
// PacketPayload
// ---------------------------------------------------------------------------

/// The information field of an [`InboundPacket`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum PacketPayload {
    /// A message, acknowledgement or rejection.
    Message(AprsMessage),
    /// Any other payload (positions, telemetry, status, …), kept raw.
    Other(String),
}

// ---------------------------------------------------------------------------
// InboundPacket
// ---------------------------------------------------------------------------

/// A decoded packet received from the APRS network.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InboundPacket {
    /// The station that originated the packet.
    pub source: Callsign,
    /// The destination (TOCALL) field.
    pub destination: String,
    /// Relay / q-construct path, in order.
    pub path: Vec<String>,
    /// The decoded information field.
    pub payload: PacketPayload,
    /// When this gateway decoded the packet.
    pub received_at: DateTime<Utc>,
}

impl InboundPacket {
    /// Returns `true` for server comment lines, which carry no packet.
    pub fn is_server_comment(line: &str) -> bool {
        line.trim_start().starts_with('#')
    }

    /// Decode one APRS-IS line.
    ///
    /// # Errors
    ///
    /// [`ModelError::MalformedPacket`] when the header is missing a `>` or
    /// `:` separator, the source is not a valid station identifier, the
    /// destination is empty, or a message payload is truncated.
    pub fn parse(line: &str) -> Result<Self, ModelError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let malformed = |reason: &str| ModelError::MalformedPacket {
            line: line.to_string(),
            reason: reason.to_string(),
        };

        if Self::is_server_comment(line) {
            return Err(malformed("server comment, not a packet"));
        }

        let (header, info) = line
            .split_once(':')
            .ok_or_else(|| malformed("missing ':' after header"))?;
        let (source, route) = header
            .split_once('>')
            .ok_or_else(|| malformed("missing '>' in header"))?;

        let source = Callsign::parse(source).map_err(|e| malformed(&e.to_string()))?;

        let mut route = route.split(',');
        let destination = route.next().unwrap_or_default().trim().to_string();
        if destination.is_empty() {
            return Err(malformed("empty destination"));
        }
        let path = route.map(|hop| hop.trim().to_string()).collect();

        let payload = match info.strip_prefix(MESSAGE_DTI) {
            Some(message) => {
                PacketPayload::Message(parse_message(message).map_err(|reason| malformed(reason))?)
            }
            None => PacketPayload::Other(info.to_string()),
        };

        Ok(Self {
            source,
            destination,
            path,
            payload,
            received_at: Utc::now(),
        })
    }

    /// The message payload, if this packet carries one.
    pub fn message(&self) -> Option<&AprsMessage> {
        match &self.payload {
            PacketPayload::Message(message) => Some(message),
            PacketPayload::Other(_) => None,
        }
    }
}

impl FromStr for InboundPacket {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Decode `ADDRESSEE:body` where the addressee is space padded to 9 chars.
fn parse_message(message: &str) -> Result<AprsMessage, &'static str> {
    let addressee = message
        .get(..MAX_CALLSIGN_LEN)
        .ok_or("message addressee shorter than 9 characters")?;
    let body = message
        .get(MAX_CALLSIGN_LEN..)
        .and_then(|rest| rest.strip_prefix(':'))
        .ok_or("missing ':' after message addressee")?;
    let addressee = Callsign::parse(addressee).map_err(|_| "invalid message addressee")?;

    Ok(AprsMessage {
        addressee,
        body: MessageBody::parse(body),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn call(s: &str) -> Callsign {
        Callsign::parse(s).unwrap()
    }

    #[test]
    fn parse_ack_packet() {
        let packet =
            InboundPacket::parse("KG5YOV>APDR16,TCPIP*,qAC,T2TEXAS::W1AW     :ack1\r\n").unwrap();
        assert_eq!(packet.source, call("KG5YOV"));
        assert_eq!(packet.destination, "APDR16");
        assert_eq!(packet.path, vec!["TCPIP*", "qAC", "T2TEXAS"]);
        let message = packet.message().unwrap();
        assert_eq!(message.addressee, call("W1AW"));
        assert_eq!(message.body, MessageBody::Ack("1".into()));
    }

    #[test]
    fn parse_text_message_with_id() {
        let packet =
            InboundPacket::parse("KG5YOV-9>APZMNT,TCPIP::W1AW-1   :hello world{17").unwrap();
        let message = packet.message().unwrap();
        assert_eq!(message.addressee, call("W1AW-1"));
        assert_eq!(
            message.body,
            MessageBody::Text {
                text: "hello world".into(),
                message_id: Some("17".into()),
            }
        );
        assert!(message.is_addressed_to(&call("w1aw-1")));
        assert!(!message.is_addressed_to(&call("W1AW")));
    }

    #[test]
    fn parse_position_is_other() {
        let packet =
            InboundPacket::parse("N0CALL>APRS,WIDE1-1:!3000.00N/09700.00W-PHG2360").unwrap();
        assert_eq!(packet.path, vec!["WIDE1-1"]);
        assert_eq!(
            packet.payload,
            PacketPayload::Other("!3000.00N/09700.00W-PHG2360".into())
        );
        assert!(packet.message().is_none());
    }

    #[test]
    fn parse_without_path() {
        let packet = InboundPacket::parse("N0CALL>APRS:>status text").unwrap();
        assert!(packet.path.is_empty());
    }

    #[test]
    fn server_comments_are_not_packets() {
        assert!(InboundPacket::is_server_comment("# aprsc 2.1.19 22 Sep 2025"));
        assert!(InboundPacket::parse("# logresp W1AW verified, server T2TEXAS").is_err());
    }

    #[test]
    fn malformed_lines_are_errors() {
        assert!(InboundPacket::parse("").is_err());
        assert!(InboundPacket::parse("no separators at all").is_err());
        assert!(InboundPacket::parse("N0CALL:payload").is_err());
        assert!(InboundPacket::parse("N0CALL>:payload").is_err());
        assert!(InboundPacket::parse("BAD/CALL>APRS:payload").is_err());
        // Truncated message payloads.
        assert!(InboundPacket::parse("N0CALL>APRS::W1AW").is_err());
        assert!(InboundPacket::parse("N0CALL>APRS::W1AW     ack1").is_err());
        assert!(InboundPacket::parse("N0CALL>APRS::W1AW/BAD :ack1").is_err());
    }

    #[test]
    fn non_ascii_payload_does_not_panic() {
        assert!(InboundPacket::parse("N0CALL>APRS::ÄÖÜÄÖ:hi").is_err());
        assert!(InboundPacket::parse("N0CALL>APRS:>héllo").is_ok());
    }
}
