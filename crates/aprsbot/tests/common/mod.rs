//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use aprsbot::{DispatchSettings, MessageDispatchCommand, NotificationSink, ReplyTarget};
use aprsbot_link::MemoryLink;
use aprsbot_models::Callsign;
use async_trait::async_trait;
use tokio::sync::Notify;

/// Records every notification for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    texts: Mutex<Vec<(ReplyTarget, String)>>,
    rich: Mutex<Vec<(ReplyTarget, serde_json::Value)>>,
    changed: Notify,
}

impl RecordingSink {
    pub fn texts(&self) -> Vec<(ReplyTarget, String)> {
        self.texts.lock().unwrap().clone()
    }

    pub fn rich(&self) -> Vec<(ReplyTarget, serde_json::Value)> {
        self.rich.lock().unwrap().clone()
    }

    /// Wait until at least `count` text notifications have arrived.
    pub async fn wait_for_texts(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Vec<(ReplyTarget, String)> {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.changed.notified();
                let texts = self.texts();
                if texts.len() >= count {
                    return texts;
                }
                notified.await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {count} notifications, got {:?}", self.texts()))
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, target: &ReplyTarget, text: &str) {
        self.texts.lock().unwrap().push((target.clone(), text.to_string()));
        self.changed.notify_waiters();
    }

    async fn notify_rich(&self, target: &ReplyTarget, payload: &serde_json::Value) {
        self.rich.lock().unwrap().push((target.clone(), payload.clone()));
        self.changed.notify_waiters();
    }
}

pub fn station() -> Callsign {
    Callsign::parse("W1AW").unwrap()
}

pub fn target(user: &str) -> ReplyTarget {
    ReplyTarget::new("#aprs", user)
}

/// A dispatcher on an in-memory link with a recording sink.
pub fn start(
    settings: DispatchSettings,
) -> (Arc<MemoryLink>, Arc<RecordingSink>, MessageDispatchCommand) {
    let link = Arc::new(MemoryLink::new(station()));
    let sink = Arc::new(RecordingSink::default());
    let dispatch = MessageDispatchCommand::start(link.clone(), sink.clone(), settings);
    (link, sink, dispatch)
}

/// Poll `condition` every few milliseconds until it holds.
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
