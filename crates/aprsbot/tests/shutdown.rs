//! Shutdown and drain behaviour of the message dispatcher.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use aprsbot::{
    DispatchOutcome, DispatchSettings, ListenerState, MessageDispatchCommand, NotificationSink,
    ReplyTarget,
};
use aprsbot_link::{LinkError, PacketLink};
use aprsbot_models::{Callsign, InboundPacket, MessageId};
use async_trait::async_trait;
use common::{start, station, target};

#[tokio::test]
async fn shutdown_closes_the_link_once() {
    let (link, _sink, dispatch) = start(DispatchSettings::default());
    assert!(matches!(
        dispatch.send("KG5YOV", "hello", target("alice")).await,
        DispatchOutcome::Queued { .. }
    ));

    dispatch.shutdown().await;
    dispatch.shutdown().await;

    assert_eq!(link.close_count(), 1);
    assert_eq!(dispatch.listener_state(), ListenerState::Stopped);
}

#[tokio::test]
async fn shutdown_interrupts_a_blocked_receive_promptly() {
    let (link, _sink, dispatch) = start(DispatchSettings::default());
    let mut state = dispatch.subscribe_listener();
    state
        .wait_for(|s| *s == ListenerState::Running)
        .await
        .unwrap();

    let started = Instant::now();
    dispatch.shutdown().await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(link.close_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_shutdowns_close_once() {
    let (link, _sink, dispatch) = start(DispatchSettings::default());
    let dispatch = Arc::new(dispatch);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let dispatch = dispatch.clone();
            tokio::spawn(async move { dispatch.shutdown().await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(link.close_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sends_get_distinct_ids() {
    let (link, _sink, dispatch) = start(DispatchSettings::default());
    let dispatch = Arc::new(dispatch);

    let handles: Vec<_> = (0..50)
        .map(|n| {
            let dispatch = dispatch.clone();
            tokio::spawn(async move {
                dispatch
                    .send("KG5YOV", &format!("msg {n}"), target("alice"))
                    .await
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            DispatchOutcome::Queued { id } => ids.push(id.value()),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    ids.sort_unstable();
    assert_eq!(ids, (1..=50).collect::<Vec<u16>>());
    assert_eq!(dispatch.pending().len(), 50);
    assert_eq!(link.transmitted().len(), 50);

    let recipient = Callsign::parse("KG5YOV").unwrap();
    for id in ids {
        let id = MessageId::new(id).unwrap();
        let resolved = dispatch.pending().resolve(&recipient, id).unwrap();
        assert_eq!(resolved.id, id);
        assert!(dispatch.pending().resolve(&recipient, id).is_none());
    }
    assert!(dispatch.pending().is_empty());

    dispatch.shutdown().await;
}

/// A sink that never returns, wedging the listener mid-notification.
struct StuckSink;

#[async_trait]
impl NotificationSink for StuckSink {
    async fn notify(&self, _target: &ReplyTarget, _text: &str) {
        std::future::pending::<()>().await;
    }

    async fn notify_rich(&self, _target: &ReplyTarget, _payload: &serde_json::Value) {
        std::future::pending::<()>().await;
    }
}

#[tokio::test]
async fn wedged_listener_is_abandoned_after_the_timeout() {
    let link = Arc::new(aprsbot_link::MemoryLink::new(station()));
    let settings = DispatchSettings {
        shutdown_timeout: Duration::from_millis(100),
        ..DispatchSettings::default()
    };
    let dispatch = MessageDispatchCommand::start(link.clone(), Arc::new(StuckSink), settings);

    dispatch.send("KG5YOV", "hello", target("alice")).await;
    link.inject("KG5YOV>APRS,TCPIP*::W1AW     :ack1").unwrap();
    common::eventually(Duration::from_secs(2), || dispatch.pending().is_empty()).await;

    let started = Instant::now();
    dispatch.shutdown().await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(link.close_count(), 1);
}

/// A link whose feed panics on first use.
struct ExplodingLink {
    station: Callsign,
    closes: AtomicUsize,
}

#[async_trait]
impl PacketLink for ExplodingLink {
    fn station(&self) -> &Callsign {
        &self.station
    }

    async fn transmit(&self, _line: &str) -> Result<(), LinkError> {
        Ok(())
    }

    async fn recv(&self) -> Option<InboundPacket> {
        panic!("feed exploded");
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn panicked_listener_still_closes_the_link() {
    let link = Arc::new(ExplodingLink {
        station: station(),
        closes: AtomicUsize::new(0),
    });
    let dispatch = MessageDispatchCommand::start(
        link.clone(),
        Arc::new(common::RecordingSink::default()),
        DispatchSettings::default(),
    );

    tokio::time::sleep(Duration::from_millis(20)).await;
    dispatch.shutdown().await;
    assert_eq!(link.closes.load(Ordering::SeqCst), 1);
}
