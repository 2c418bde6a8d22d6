//! The transport seam between the gateway and the packet network.

use aprsbot_models::{Callsign, InboundPacket};
use async_trait::async_trait;

use crate::error::LinkError;

/// A connected packet network.
///
/// Implementations must tolerate `transmit` being called from several
/// tasks at once (writes are serialized internally) while a single
/// consumer drives [`recv`](Self::recv).
#[async_trait]
pub trait PacketLink: Send + Sync {
    /// The station this link is logged in as.
    fn station(&self) -> &Callsign;

    /// Send one packet line. The line ending is added by the link.
    async fn transmit(&self, line: &str) -> Result<(), LinkError>;

    /// Wait for the next decoded inbound packet.
    ///
    /// Returns `None` once the feed has ended, either because
    /// [`close`](Self::close) was called or the server went away. An ended
    /// feed stays ended.
    async fn recv(&self) -> Option<InboundPacket>;

    /// End the feed and release the connection. Idempotent.
    async fn close(&self);
}
