#![deny(missing_docs)]

//! # aprsbot models
//!
//! Core data types for the aprsbot APRS messaging gateway.
//!
//! ## Packet hierarchy
//!
//! ```text
//! InboundPacket (SRC>DEST,PATH:payload)
//! ├── PacketPayload::Message(AprsMessage)
//! │   ├── MessageBody::Text { text, message_id }
//! │   ├── MessageBody::Ack(id)
//! │   └── MessageBody::Rej(id)
//! └── PacketPayload::Other(raw)
//!
//! OutboundPacket (built with PacketBuilder)
//! ├── OutboundBody::Message { text, id }
//! └── OutboundBody::Ack(id)
//! ```
//!
//! ## Module layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`station`] | Validated station identifiers (`Callsign`) |
//! | [`message`] | Message ids and message bodies |
//! | [`packet`] | Inbound APRS-IS line parsing |
//! | [`packet_builder`] | Outbound packet construction and wire format |
//! | [`error`] | `ModelError` |

pub mod error;
pub mod message;
pub mod packet;
pub mod packet_builder;
pub mod station;

// Re-export all public types at crate root for convenience.
pub use error::*;
pub use message::*;
pub use packet::*;
pub use packet_builder::*;
pub use station::*;
