//! Opening handshake, outbound queueing and socket adoption.

mod common;

use common::{DOCUMENT, config, loaded, start};
use docwire::{Notification, ReadyState, RecoveryState};
use docwire_testing::{MockConnector, assert_notified, settle};
use rstest::rstest;

#[rstest]
#[tokio::test(start_paused = true)]
async fn open_sends_greeting_then_load() {
    let running = start(config());
    settle(&running.handle).await;
    let peer = running.connector.last_peer();
    assert_eq!(peer.url().scheme(), "wss");
    assert!(peer.url().path().contains("permission%3Dedit"));

    peer.open();
    settle(&running.handle).await;
    let sent = peer.sent_text();
    assert!(sent[0].starts_with("coolclient 0.1 1700000000000"), "{sent:?}");
    assert!(sent[1].starts_with("load url=https%3A%2F%2Fwopi.example"), "{sent:?}");
    assert!(sent[1].contains(" lang=en-US "));
    assert!(!sent[1].contains(" part="), "first load has no part: {}", sent[1]);
    running.stop().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn messages_sent_while_connecting_follow_the_handshake() {
    let running = start(config());
    for message in ["uno .uno:Bold", "uno .uno:Italic", "clientzoom 1"] {
        running.handle.send_message(message).expect("actor running");
    }
    let snapshot = settle(&running.handle).await;
    assert_eq!(snapshot.queued, 3);
    assert_eq!(snapshot.ready_state, Some(ReadyState::Connecting));

    let peer = running.connector.last_peer();
    peer.open();
    let snapshot = settle(&running.handle).await;
    assert_eq!(snapshot.queued, 0);
    let sent = peer.sent_text();
    assert_eq!(sent.len(), 5);
    assert!(sent[0].starts_with("coolclient "));
    assert!(sent[1].starts_with("load "));
    assert_eq!(&sent[2..], ["uno .uno:Bold", "uno .uno:Italic", "clientzoom 1"]);
    assert!(snapshot.active);
    running.stop().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn open_sockets_are_sent_to_directly() {
    let (running, peer) = loaded().await;
    running.handle.send_message("uno .uno:Save").expect("actor running");
    settle(&running.handle).await;
    assert_eq!(peer.sent_text().last().map(String::as_str), Some("uno .uno:Save"));
    running.stop().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn adopted_open_socket_skips_the_handshake() {
    let seed = MockConnector::new();
    let (socket, peer) = seed.detached_socket("wss://office.example/cool", ReadyState::Open);
    let running = start(config());
    running.handle.connect(Some(socket)).expect("actor running");
    let snapshot = settle(&running.handle).await;

    assert!(peer.is_attached(), "adopted socket reports to the session");
    assert_eq!(snapshot.ready_state, Some(ReadyState::Open));
    assert!(snapshot.active);
    assert!(peer.sent_text().is_empty(), "no greeting on an adopted socket");

    peer.send_text("status: {\"type\":\"text\"}");
    let snapshot = settle(&running.handle).await;
    assert!(snapshot.loaded_once);
    assert_eq!(running.view.delivered(), ["status: {\"type\":\"text\"}"]);
    running.stop().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn closed_socket_is_not_adopted() {
    let seed = MockConnector::new();
    let (socket, peer) = seed.detached_socket("wss://office.example/cool", ReadyState::Closed);
    let running = start(config());
    settle(&running.handle).await;
    let before = running.connector.connect_count();
    running.handle.connect(Some(socket)).expect("actor running");
    settle(&running.handle).await;
    assert!(!peer.is_attached());
    assert_eq!(running.connector.connect_count(), before + 1);
    running.stop().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn reconnect_reloads_the_current_part() {
    let (running, peer) = loaded().await;
    running.view.set_part(Some(3));
    peer.drop_connection("network");
    settle(&running.handle).await;

    let next = running.connector.last_peer();
    assert_eq!(running.connector.connect_count(), 2);
    next.open();
    settle(&running.handle).await;
    let load = next.sent_text().into_iter().find(|m| m.starts_with("load ")).expect("load sent");
    assert!(load.contains(" part=3 "), "{load}");
    running.stop().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn connector_failure_is_fatal() {
    let running = start(config());
    settle(&running.handle).await;
    running.connector.fail_next(1);
    running.handle.close(None, None).expect("actor running");
    running.handle.activate().expect("actor running");
    let snapshot = settle(&running.handle).await;
    assert_eq!(snapshot.recovery, RecoveryState::Fatal);
    assert_notified!(running.view, Notification::Fatal { .. });
    running.stop().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn socket_url_carries_the_document() {
    let running = start(config());
    settle(&running.handle).await;
    let url = running.connector.last_peer().url();
    let decoded = percent_decode(url.path());
    assert!(decoded.contains(DOCUMENT), "{decoded}");
    running.stop().await;
}

fn percent_decode(text: &str) -> String {
    url::form_urlencoded::parse(format!("x={text}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}
