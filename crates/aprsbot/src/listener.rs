//! Background consumer of the inbound packet feed.
//!
//! The listener owns the receive side of the [`PacketLink`]. For every
//! packet addressed to this station it either resolves a pending message
//! (`ack`/`rej`) and tells the original requester, or acknowledges an
//! inbound text message. A ticker on the same loop expires messages that
//! were never acknowledged.
//!
//! ```text
//!  Starting ──► Running ──► Stopping ──► Stopped
//!                  │  ▲
//!   recv / sweep ──┘  └── loop until cancelled or the feed ends
//! ```

use std::sync::Arc;
use std::time::Duration;

use aprsbot_link::PacketLink;
use aprsbot_models::{Callsign, InboundPacket, MessageBody, MessageId, PacketBuilder};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::notify::NotificationSink;
use crate::pending::{PendingMessage, PendingMessageTable};

/// Lifecycle of the listener task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ListenerState {
    /// Spawned, loop not yet entered.
    Starting,
    /// Consuming packets.
    Running,
    /// Leaving the loop.
    Stopping,
    /// The task has finished.
    Stopped,
}

/// How a pending message was settled by the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Acknowledged,
    Rejected,
}

/// Text sent to the requester when `message` is acknowledged.
pub fn acknowledged_text(message: &PendingMessage) -> String {
    format!("Message ID {} to {} was acknowledged!", message.id, message.recipient)
}

/// Text sent to the requester when `message` is rejected.
pub fn rejected_text(message: &PendingMessage) -> String {
    format!("Message ID {} to {} was rejected.", message.id, message.recipient)
}

/// Text sent to the requester when `message` times out.
pub fn expired_text(message: &PendingMessage, timeout: Duration) -> String {
    format!(
        "Message ID {} to {} was not acknowledged within {}.",
        message.id,
        message.recipient,
        describe_timeout(timeout)
    )
}

fn describe_timeout(timeout: Duration) -> String {
    let secs = timeout.as_secs();
    match secs {
        0 => format!("{} milliseconds", timeout.as_millis()),
        60 => "1 minute".to_string(),
        s if s >= 60 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{s} seconds"),
    }
}

/// The packet consumer. Built and started with [`InboundListener::spawn`].
pub struct InboundListener {
    link: Arc<dyn PacketLink>,
    pending: Arc<PendingMessageTable>,
    sink: Arc<dyn NotificationSink>,
    ack_timeout: Duration,
    sweep_interval: Duration,
    cancel: CancellationToken,
    state: watch::Sender<ListenerState>,
}

impl InboundListener {
    /// Start the listener on a new task.
    pub fn spawn(
        link: Arc<dyn PacketLink>,
        pending: Arc<PendingMessageTable>,
        sink: Arc<dyn NotificationSink>,
        ack_timeout: Duration,
        sweep_interval: Duration,
    ) -> ListenerHandle {
        let cancel = CancellationToken::new();
        let (state, state_rx) = watch::channel(ListenerState::Starting);
        let listener = Self {
            link,
            pending,
            sink,
            ack_timeout,
            sweep_interval: sweep_interval.max(Duration::from_millis(1)),
            cancel: cancel.clone(),
            state,
        };
        let task = tokio::spawn(listener.run());
        ListenerHandle {
            cancel,
            state: state_rx,
            task,
        }
    }

    async fn run(self) {
        let station = self.link.station().clone();
        self.state.send_replace(ListenerState::Running);
        info!(
            %station,
            ack_timeout_secs = self.ack_timeout.as_secs(),
            sweep_interval_secs = self.sweep_interval.as_secs(),
            "inbound listener running"
        );

        let mut sweep_ticker = tokio::time::interval(self.sweep_interval);
        sweep_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can have expired yet.
        sweep_ticker.tick().await;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                // Ahead of recv so a busy feed cannot starve expiry.
                _ = sweep_ticker.tick() => self.sweep_expired().await,
                maybe_packet = self.link.recv() => {
                    let Some(packet) = maybe_packet else {
                        if !self.cancel.is_cancelled() {
                            error!(%station, "packet feed ended unexpectedly, listener stopping");
                        }
                        break;
                    };
                    self.handle_packet(packet).await;
                }
            }
        }

        self.state.send_replace(ListenerState::Stopping);
        info!(%station, pending = self.pending.len(), "inbound listener stopping");
        self.state.send_replace(ListenerState::Stopped);
    }

    async fn handle_packet(&self, packet: InboundPacket) {
        let Some(message) = packet.message() else {
            trace!(source = %packet.source, "ignoring non-message packet");
            return;
        };
        if !message.is_addressed_to(self.link.station()) {
            trace!(
                source = %packet.source,
                addressee = %message.addressee,
                "ignoring message for another station"
            );
            return;
        }

        match &message.body {
            MessageBody::Ack(id) => {
                self.resolve(&packet.source, id, Resolution::Acknowledged).await;
            }
            MessageBody::Rej(id) => self.resolve(&packet.source, id, Resolution::Rejected).await,
            MessageBody::Text { text, message_id } => {
                info!(from = %packet.source, %text, id = ?message_id, "message received");
                if let Some(id) = message_id {
                    self.acknowledge(&packet.source, id).await;
                }
            }
        }
    }

    async fn resolve(&self, source: &Callsign, raw_id: &str, resolution: Resolution) {
        let Ok(id) = raw_id.parse::<MessageId>() else {
            info!(%source, id = %raw_id, "response carries an id this station never issues");
            return;
        };
        let Some(message) = self.pending.resolve(source, id) else {
            return;
        };

        let text = match resolution {
            Resolution::Acknowledged => acknowledged_text(&message),
            Resolution::Rejected => rejected_text(&message),
        };
        info!(
            recipient = %message.recipient,
            %id,
            target = %message.reply_target,
            ?resolution,
            "pending message resolved"
        );
        self.sink.notify(&message.reply_target, &text).await;
    }

    async fn acknowledge(&self, source: &Callsign, id: &str) {
        let packet = match PacketBuilder::from(self.link.station()).to(source).ack(id).build() {
            Ok(packet) => packet,
            Err(e) => {
                warn!(%source, %id, error = %e, "could not build ack");
                return;
            }
        };
        match self.link.transmit(&packet.to_string()).await {
            Ok(()) => debug!(%source, %id, "ack sent"),
            Err(e) => warn!(%source, %id, error = %e, "failed to send ack"),
        }
    }

    async fn sweep_expired(&self) {
        let expired = self.pending.sweep_expired(Utc::now(), self.ack_timeout);
        for message in expired {
            info!(
                recipient = %message.recipient,
                id = %message.id,
                target = %message.reply_target,
                "pending message expired without acknowledgement"
            );
            self.sink
                .notify(&message.reply_target, &expired_text(&message, self.ack_timeout))
                .await;
        }
    }
}

/// How the listener task ended when it was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ListenerExit {
    /// Stopped in response to the cancel request.
    Clean,
    /// Had already stopped on its own before the cancel request.
    AlreadyStopped,
    /// Did not stop within the timeout and was aborted.
    TimedOut,
    /// The task panicked.
    Panicked,
}

/// Control handle for a running [`InboundListener`].
pub struct ListenerHandle {
    cancel: CancellationToken,
    state: watch::Receiver<ListenerState>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// The current state.
    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<ListenerState> {
        self.state.clone()
    }

    /// `true` once the task has returned or panicked.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the listener and wait up to `timeout` for it to finish.
    pub async fn stop(mut self, timeout: Duration) -> ListenerExit {
        let already_finished = self.task.is_finished();
        self.cancel.cancel();

        match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(Ok(())) if already_finished => {
                warn!("inbound listener had already stopped");
                ListenerExit::AlreadyStopped
            }
            Ok(Ok(())) => {
                debug!("inbound listener stopped");
                ListenerExit::Clean
            }
            Ok(Err(e)) => {
                error!(error = %e, "inbound listener panicked");
                ListenerExit::Panicked
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis(),
                    "inbound listener did not stop in time, aborting"
                );
                self.task.abort();
                ListenerExit::TimedOut
            }
        }
    }
}
