//! In-memory [`PacketLink`] for tests.
//!
//! Inbound packets are injected through a channel; transmitted lines and
//! `close` calls are recorded for later assertions.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use aprsbot_models::{Callsign, InboundPacket, ModelError};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::LinkError;
use crate::link::PacketLink;

/// A loopback link with no network behind it.
pub struct MemoryLink {
    station: Callsign,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<InboundPacket>>>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<InboundPacket>>,
    transmitted: Mutex<Vec<String>>,
    fail_transmit: AtomicBool,
    close_calls: AtomicUsize,
    closed: CancellationToken,
}

impl MemoryLink {
    /// A link logged in as `station`.
    pub fn new(station: Callsign) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            station,
            inbound_tx: Mutex::new(Some(tx)),
            inbound_rx: tokio::sync::Mutex::new(rx),
            transmitted: Mutex::new(Vec::new()),
            fail_transmit: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            closed: CancellationToken::new(),
        }
    }

    /// Decode `line` and queue it for [`recv`](PacketLink::recv).
    ///
    /// # Errors
    ///
    /// Propagates the decode error for malformed lines.
    pub fn inject(&self, line: &str) -> Result<(), ModelError> {
        let packet = InboundPacket::parse(line)?;
        self.inject_packet(packet);
        Ok(())
    }

    /// Queue an already decoded packet. Ignored after the feed has ended.
    pub fn inject_packet(&self, packet: InboundPacket) {
        if let Some(tx) = self.lock_sender().as_ref() {
            let _ = tx.send(packet);
        }
    }

    /// End the feed as if the server had disconnected. Packets already
    /// queued are still delivered.
    pub fn end_feed(&self) {
        self.lock_sender().take();
    }

    /// Lines passed to `transmit`, in order.
    pub fn transmitted(&self) -> Vec<String> {
        self.transmitted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Make subsequent `transmit` calls fail with an I/O error.
    pub fn set_fail_transmit(&self, fail: bool) {
        self.fail_transmit.store(fail, Ordering::SeqCst);
    }

    /// How many times `close` has been called.
    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    fn lock_sender(
        &self,
    ) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<InboundPacket>>> {
        self.inbound_tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl PacketLink for MemoryLink {
    fn station(&self) -> &Callsign {
        &self.station
    }

    async fn transmit(&self, line: &str) -> Result<(), LinkError> {
        if self.closed.is_cancelled() {
            return Err(LinkError::Closed);
        }
        if self.fail_transmit.load(Ordering::SeqCst) {
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "transmit failure injected",
            )));
        }
        self.transmitted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }

    async fn recv(&self) -> Option<InboundPacket> {
        let mut rx = self.inbound_rx.lock().await;
        tokio::select! {
            () = self.closed.cancelled() => None,
            packet = rx.recv() => packet,
        }
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.cancel();
        self.end_feed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn link() -> MemoryLink {
        MemoryLink::new(Callsign::parse("W1AW").unwrap())
    }

    #[tokio::test]
    async fn injected_packets_are_received_in_order() {
        let link = link();
        link.inject("KG5YOV>APRS,TCPIP*::W1AW     :ack1").unwrap();
        link.inject("N0CALL>APRS:>status").unwrap();
        assert_eq!(link.recv().await.unwrap().source.as_str(), "KG5YOV");
        assert_eq!(link.recv().await.unwrap().source.as_str(), "N0CALL");
    }

    #[tokio::test]
    async fn ended_feed_drains_then_returns_none() {
        let link = link();
        link.inject("N0CALL>APRS:>status").unwrap();
        link.end_feed();
        assert!(link.recv().await.is_some());
        assert!(link.recv().await.is_none());
    }

    #[tokio::test]
    async fn records_transmits_and_injected_failures() {
        let link = link();
        link.transmit("one").await.unwrap();
        link.set_fail_transmit(true);
        assert!(matches!(link.transmit("two").await, Err(LinkError::Io(_))));
        link.set_fail_transmit(false);
        link.transmit("three").await.unwrap();
        assert_eq!(link.transmitted(), vec!["one", "three"]);
    }

    #[tokio::test]
    async fn close_wakes_a_blocked_receiver() {
        let link = Arc::new(link());
        let receiver = {
            let link = link.clone();
            tokio::spawn(async move { link.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        link.close().await;
        assert!(receiver.await.unwrap().is_none());
        assert_eq!(link.close_count(), 1);
        assert!(matches!(link.transmit("late").await, Err(LinkError::Closed)));
    }

    #[test]
    fn malformed_injection_is_an_error() {
        assert!(link().inject("not a packet").is_err());
    }
}
