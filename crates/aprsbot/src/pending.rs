//! Registry of sent messages awaiting acknowledgement.
//!
//! Written by the command path when a message goes out, read and drained
//! by the inbound listener when an `ack`/`rej` arrives or an entry times
//! out. Every operation holds the table lock for its whole
//! check-and-modify, so an entry is removed exactly once even when
//! resolution and expiry race.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use aprsbot_models::{Callsign, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::notify::ReplyTarget;

/// A message that was transmitted and has not yet been acknowledged.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    /// Message number sent in the `{id` suffix.
    pub id: MessageId,
    /// Station the message was sent to.
    pub recipient: Callsign,
    /// The exact packet line transmitted.
    pub raw_payload: String,
    /// When the packet was transmitted.
    pub created_at: DateTime<Utc>,
    /// Who asked for the message to be sent.
    pub reply_target: ReplyTarget,
}

impl PendingMessage {
    /// `true` when the entry has waited longer than `timeout` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        now.signed_duration_since(self.created_at) > timeout
    }
}

type Key = (Callsign, MessageId);

/// Thread-safe table of [`PendingMessage`]s keyed by `(recipient, id)`.
#[derive(Debug, Default)]
pub struct PendingMessageTable {
    entries: Mutex<HashMap<Key, PendingMessage>>,
}

impl PendingMessageTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `message`. Returns `false`, leaving the existing entry
    /// untouched, when one with the same recipient and id is already
    /// pending.
    pub fn register(&self, message: PendingMessage) -> bool {
        let key = (message.recipient.clone(), message.id);
        let mut entries = self.lock();
        if entries.contains_key(&key) {
            warn!(
                recipient = %message.recipient,
                id = %message.id,
                "message already pending, not registering again"
            );
            return false;
        }
        debug!(recipient = %message.recipient, id = %message.id, "message pending");
        entries.insert(key, message);
        true
    }

    /// `true` when `(recipient, id)` is pending.
    pub fn contains(&self, recipient: &Callsign, id: MessageId) -> bool {
        self.lock().contains_key(&(recipient.clone(), id))
    }

    /// Remove and return the entry for `(recipient, id)`, if any.
    pub fn resolve(&self, recipient: &Callsign, id: MessageId) -> Option<PendingMessage> {
        let resolved = self.lock().remove(&(recipient.clone(), id));
        if resolved.is_none() {
            info!(%recipient, %id, "no pending message matches");
        }
        resolved
    }

    /// Remove and return every entry older than `timeout` at `now`, ordered
    /// by id.
    pub fn sweep_expired(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<PendingMessage> {
        let mut expired: Vec<PendingMessage> = {
            let mut entries = self.lock();
            let keys: Vec<Key> = entries
                .iter()
                .filter(|(_, message)| message.is_expired(now, timeout))
                .map(|(key, _)| key.clone())
                .collect();
            keys.iter().filter_map(|key| entries.remove(key)).collect()
        };
        expired.sort_by_key(|message| message.id);
        expired
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // No code path panics while holding the lock, so a poisoned table is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<Key, PendingMessage>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
