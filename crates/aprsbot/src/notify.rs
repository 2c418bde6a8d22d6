//! Outbound notifications to chat users.
//!
//! [`NotificationSink`] is the seam between the bot and whatever chat
//! transport is in use. Notifications are fire-and-forget: a sink logs its
//! own delivery failures.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::warn;

/// Where a reply or later notification should be delivered.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplyTarget {
    /// Chat channel the command arrived on.
    pub channel: String,
    /// User (or session) that issued the command.
    pub user: String,
}

impl ReplyTarget {
    /// Target `user` on `channel`.
    pub fn new(channel: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            user: user.into(),
        }
    }
}

impl fmt::Display for ReplyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.channel)
    }
}

/// Delivers messages to chat users.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Send plain text to `target`.
    async fn notify(&self, target: &ReplyTarget, text: &str);

    /// Send a structured payload (attachments, cards) to `target`.
    async fn notify_rich(&self, target: &ReplyTarget, payload: &serde_json::Value);
}

/// A sink that writes one line per notification, prefixed with the target.
pub struct ConsoleSink<W> {
    out: Mutex<W>,
}

impl ConsoleSink<tokio::io::Stdout> {
    /// Write to standard output.
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> ConsoleSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Write to `out`.
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    async fn write_line(&self, target: &ReplyTarget, body: &str) {
        let mut out = self.out.lock().await;
        let line = format!("[{target}] {body}\n");
        let result = async {
            out.write_all(line.as_bytes()).await?;
            out.flush().await
        }
        .await;
        if let Err(e) = result {
            warn!(%target, error = %e, "failed to deliver notification");
        }
    }

    /// Consume the sink and return the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W> NotificationSink for ConsoleSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn notify(&self, target: &ReplyTarget, text: &str) {
        // Continuation lines are indented so one notification stays visually grouped.
        let text = text.replace('\n', "\n    ");
        self.write_line(target, &text).await;
    }

    async fn notify_rich(&self, target: &ReplyTarget, payload: &serde_json::Value) {
        self.write_line(target, &payload.to_string()).await;
    }
}
