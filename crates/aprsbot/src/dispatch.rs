//! The `message` command: validate, transmit, track.
//!
//! [`MessageDispatchCommand`] owns the APRS side of the bot. Creating it
//! starts the [`InboundListener`]; [`send`](MessageDispatchCommand::send)
//! puts a message on the air and registers it as pending, returning
//! immediately. The acknowledgement, rejection or timeout is reported
//! later through the [`NotificationSink`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use aprsbot_link::{LinkError, PacketLink};
use aprsbot_models::{Callsign, MAX_MESSAGE_LEN, MessageId, PacketBuilder};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::command::{Command, CommandReply};
use crate::error::ValidationError;
use crate::listener::{InboundListener, ListenerHandle, ListenerState};
use crate::notify::{NotificationSink, ReplyTarget};
use crate::pending::{PendingMessage, PendingMessageTable};

/// Characters that break APRS message framing.
pub const FORBIDDEN_CHARS: [char; 3] = ['|', '~', '{'];

const USAGE: &str = "Type this command as 'message <callsign> <message>'.";

/// Timing parameters for the dispatcher and its listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// How long a sent message may wait for its acknowledgement.
    pub ack_timeout: Duration,
    /// How often pending messages are checked for expiry.
    pub sweep_interval: Duration,
    /// Upper bound for the listener to stop during shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

/// Result of [`MessageDispatchCommand::send`].
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Transmitted and waiting for an acknowledgement.
    Queued {
        /// Id assigned to the message.
        id: MessageId,
    },
    /// Refused before anything was transmitted.
    Rejected(ValidationError),
    /// The link failed to transmit; nothing is pending.
    Failed(LinkError),
    /// No id was free for this recipient, so the message is not
    /// tracked. Normally nothing was transmitted.
    Busy,
}

/// Check a send request, returning the normalized recipient.
///
/// # Errors
///
/// The first failing check, in this order: empty recipient, invalid
/// recipient, empty text, text too long, forbidden character, control
/// character.
pub fn validate(recipient: &str, text: &str) -> Result<Callsign, ValidationError> {
    let recipient = recipient.trim();
    if recipient.is_empty() {
        return Err(ValidationError::EmptyRecipient);
    }
    let callsign = Callsign::parse(recipient)
        .map_err(|_| ValidationError::InvalidRecipient(recipient.to_uppercase()))?;
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    if text.len() > MAX_MESSAGE_LEN {
        return Err(ValidationError::MessageTooLong {
            len: text.len(),
            max: MAX_MESSAGE_LEN,
        });
    }
    if let Some(c) = text.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(ValidationError::ForbiddenCharacter(c));
    }
    // A line break would end the packet early and start another one.
    if let Some(c) = text.chars().find(|c| c.is_control()) {
        return Err(ValidationError::ControlCharacter(c));
    }
    Ok(callsign)
}

/// Sends chat-requested messages onto APRS-IS and tracks their
/// acknowledgements.
pub struct MessageDispatchCommand {
    link: Arc<dyn PacketLink>,
    pending: Arc<PendingMessageTable>,
    next_id: AtomicU16,
    /// `None` once shut down.
    listener: Mutex<Option<ListenerHandle>>,
    listener_state: watch::Receiver<ListenerState>,
    shutdown_timeout: Duration,
}

impl MessageDispatchCommand {
    /// Start the inbound listener on `link` and return the dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        link: Arc<dyn PacketLink>,
        sink: Arc<dyn NotificationSink>,
        settings: DispatchSettings,
    ) -> Self {
        let pending = Arc::new(PendingMessageTable::new());
        let listener = InboundListener::spawn(
            link.clone(),
            pending.clone(),
            sink,
            settings.ack_timeout,
            settings.sweep_interval,
        );
        let listener_state = listener.subscribe();
        info!(station = %link.station(), "message dispatch started");
        Self {
            link,
            pending,
            next_id: AtomicU16::new(MessageId::FIRST.value()),
            listener: Mutex::new(Some(listener)),
            listener_state,
            shutdown_timeout: settings.shutdown_timeout,
        }
    }

    /// Validate, transmit and register a message to `recipient`.
    ///
    /// Returns as soon as the packet is written; acknowledgement is
    /// reported later to `reply_target`. A transmit failure consumes the
    /// id but registers nothing.
    pub async fn send(
        &self,
        recipient: &str,
        text: &str,
        reply_target: ReplyTarget,
    ) -> DispatchOutcome {
        let recipient = match validate(recipient, text) {
            Ok(callsign) => callsign,
            Err(e) => {
                info!(%recipient, target = %reply_target, reason = %e, "message refused");
                return DispatchOutcome::Rejected(e);
            }
        };

        let Some(id) = self.allocate_free_id(&recipient) else {
            warn!(%recipient, target = %reply_target, "no free message id for recipient");
            return DispatchOutcome::Busy;
        };
        let packet = match PacketBuilder::from(self.link.station())
            .to(&recipient)
            .message(text, id)
            .build()
        {
            Ok(packet) => packet.to_string(),
            Err(e) => return DispatchOutcome::Failed(e.into()),
        };

        if let Err(e) = self.link.transmit(&packet).await {
            warn!(%recipient, %id, error = %e, "failed to transmit message");
            return DispatchOutcome::Failed(e);
        }

        let registered = self.pending.register(PendingMessage {
            id,
            recipient: recipient.clone(),
            raw_payload: packet,
            created_at: Utc::now(),
            reply_target: reply_target.clone(),
        });
        if !registered {
            warn!(%recipient, %id, "message id taken while transmitting, not tracked");
            return DispatchOutcome::Busy;
        }
        info!(%recipient, %id, target = %reply_target, "message queued");
        DispatchOutcome::Queued { id }
    }

    /// Stop the listener and close the link. Safe to call more than once.
    pub async fn shutdown(&self) {
        let Some(listener) = self.listener.lock().await.take() else {
            debug!("message dispatch already shut down");
            return;
        };
        info!(pending = self.pending.len(), "message dispatch shutting down");
        let exit = listener.stop(self.shutdown_timeout).await;
        self.link.close().await;
        info!(%exit, "message dispatch shut down");
    }

    /// The pending-message table.
    pub fn pending(&self) -> &PendingMessageTable {
        &self.pending
    }

    /// Current listener state.
    pub fn listener_state(&self) -> ListenerState {
        *self.listener_state.borrow()
    }

    /// Observe listener state changes.
    pub fn subscribe_listener(&self) -> watch::Receiver<ListenerState> {
        self.listener_state.clone()
    }

    /// Next id not already pending for `recipient`, or `None` after a full
    /// cycle.
    fn allocate_free_id(&self, recipient: &Callsign) -> Option<MessageId> {
        (0..MessageId::MAX.value())
            .map(|_| self.allocate_id())
            .find(|id| !self.pending.contains(recipient, *id))
    }

    fn allocate_id(&self) -> MessageId {
        let issue = |raw: u16| MessageId::new(raw).unwrap_or(MessageId::FIRST);
        let previous = self
            .next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |raw| Some(issue(raw).next().value()))
            .unwrap_or_else(|raw| raw);
        issue(previous)
    }
}

#[async_trait]
impl Command for MessageDispatchCommand {
    fn name(&self) -> &'static str {
        "message"
    }

    fn syntax(&self) -> &'static str {
        "message <callsign> <message>"
    }

    fn help(&self) -> &'static str {
        "Send an APRS message to a callsign."
    }

    async fn do_command(&self, args: &[&str], target: &ReplyTarget) -> CommandReply {
        let Some((callsign, words)) = args.split_first() else {
            return CommandReply::text(format!(
                "Sorry, I need a callsign to send a message.\n{USAGE}"
            ));
        };
        let callsign = callsign.to_uppercase();
        let text = words.join(" ");

        let reply = match self.send(&callsign, &text, target.clone()).await {
            DispatchOutcome::Queued { id } => format!(
                "Queued message ID {id} to {callsign}. I'll let you know when it's acknowledged."
            ),
            DispatchOutcome::Rejected(reason) => match reason {
                ValidationError::EmptyRecipient => {
                    format!("Sorry, I need a callsign to send a message.\n{USAGE}")
                }
                ValidationError::InvalidRecipient(call) => {
                    format!("Sorry, {call} is not a valid callsign.")
                }
                ValidationError::EmptyMessage => {
                    format!("Sorry, I need a message to send to {callsign}.\n{USAGE}")
                }
                ValidationError::MessageTooLong { max, .. } => {
                    format!("Sorry, that message is too long to send via APRS ({max} characters max).")
                }
                ValidationError::ForbiddenCharacter(_) => {
                    "Sorry, APRS messages can't contain '|', '~' or '{'.".to_string()
                }
                ValidationError::ControlCharacter(_) => {
                    "Sorry, APRS messages can't contain line breaks or other control characters."
                        .to_string()
                }
            },
            DispatchOutcome::Failed(e) => format!("Sorry, I couldn't send that message: {e}"),
            DispatchOutcome::Busy => format!(
                "Sorry, too many messages to {callsign} are still waiting for acknowledgement. Try again later."
            ),
        };
        CommandReply::text(reply)
    }

    async fn shutdown(&self) {
        MessageDispatchCommand::shutdown(self).await;
    }
}
