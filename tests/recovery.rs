//! Reconnect loops, retry back-off and the fatal state.

mod common;

use std::time::Duration;

use common::{SERVER_A, SERVER_B, config, loaded, start};
use docwire::{Notification, Permission, RecoveryState, RetryCategory, SessionHandle, strings};
use docwire_testing::{assert_not_notified, assert_notified, settle};
use rstest::rstest;
use tokio::time::{Instant, sleep, sleep_until};

async fn retry_delay(handle: &SessionHandle) -> Duration {
    let snapshot = handle.snapshot().await.expect("actor running");
    let deadline = snapshot.retry_deadline.expect("retry armed");
    deadline.saturating_duration_since(Instant::now())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn unexpected_close_starts_the_reconnect_loop() {
    let (running, peer) = loaded().await;
    peer.drop_connection("network");
    let snapshot = running.handle.snapshot().await.expect("actor running");
    assert_eq!(snapshot.recovery, RecoveryState::Recovering(RetryCategory::ConnectionLost));
    let period = snapshot.reconnect_period.expect("loop running");
    assert!((Duration::from_secs(5)..Duration::from_secs(10)).contains(&period), "{period:?}");
    assert_notified!(running.view, Notification::Busy { message } if message == strings::RECONNECTING);
    assert_notified!(running.view, Notification::DocumentLoaded(false));
    assert_eq!(running.view.permissions().last(), Some(&Permission::View));

    settle(&running.handle).await;
    assert_eq!(running.connector.connect_count(), 2, "first retry fires almost at once");

    let next = running.connector.last_peer();
    next.open();
    let snapshot = settle(&running.handle).await;
    assert_eq!(snapshot.reconnect_period, None);
    next.send_text("status: {\"type\":\"text\"}");
    let snapshot = settle(&running.handle).await;
    assert_eq!(snapshot.recovery, RecoveryState::Healthy);
    assert_notified!(running.view, Notification::Reconnected);
    assert_eq!(running.view.permissions().last(), Some(&Permission::Edit));
    running.stop().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn reconnect_loop_keeps_trying_while_unreachable() {
    let (running, peer) = loaded().await;
    peer.drop_connection("network");
    settle(&running.handle).await;
    let first_retry = running.connector.last_peer();
    first_retry.drop_connection("refused");
    settle(&running.handle).await;
    assert_eq!(running.connector.connect_count(), 2);

    let period = running
        .handle
        .snapshot()
        .await
        .expect("actor running")
        .reconnect_period
        .expect("loop running");
    sleep(period).await;
    settle(&running.handle).await;
    assert_eq!(running.connector.connect_count(), 3);
    running.stop().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn recycling_server_is_retried_with_jitter() {
    let (running, peer) = loaded().await;
    peer.send_text("close: recycling");
    let snapshot = settle(&running.handle).await;
    let period = snapshot.reconnect_period.expect("loop running");
    assert!((Duration::from_secs(5)..Duration::from_secs(10)).contains(&period), "{period:?}");
    assert!(!snapshot.active);

    running.view.clear_notifications();
    peer.drop_connection("");
    let snapshot = settle(&running.handle).await;
    assert_eq!(snapshot.reconnect_period, Some(period), "recycling loop is kept");
    assert_not_notified!(running.view, Notification::Busy { .. });
    assert_eq!(running.connector.connect_count(), 1);

    sleep_until(snapshot.retry_deadline.expect("retry armed")).await;
    settle(&running.handle).await;
    assert_eq!(running.connector.connect_count(), 2);

    running.connector.last_peer().open();
    let snapshot = settle(&running.handle).await;
    assert_eq!(snapshot.reconnect_period, None, "reconnect cancels the loop");
    running.stop().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn unloading_document_backs_off_quadratically_then_gives_up() {
    let running = start(config());
    settle(&running.handle).await;

    for attempt in 1..=10_u64 {
        assert_eq!(running.connector.connect_count(), attempt as usize);
        let peer = running.connector.last_peer();
        peer.open();
        peer.send_text("error: cmd=load kind=docunloading");
        sleep(Duration::from_millis(5)).await;
        let delay = retry_delay(&running.handle).await;
        let expected = Duration::from_millis(500 * attempt * attempt);
        assert!(
            delay <= expected && expected - delay <= Duration::from_millis(5),
            "attempt {attempt}: {delay:?} vs {expected:?}"
        );
        sleep(delay).await;
        settle(&running.handle).await;
    }

    let peer = running.connector.last_peer();
    peer.open();
    peer.send_text("error: cmd=load kind=docunloading");
    let snapshot = settle(&running.handle).await;
    assert_eq!(snapshot.recovery, RecoveryState::GivenUp);
    assert_eq!(snapshot.retry_deadline, None);
    assert_notified!(
        running.view,
        Notification::Error { message } if message == strings::DOC_UNLOADING_GIVE_UP
    );
    sleep(Duration::from_secs(120)).await;
    assert_eq!(running.connector.connect_count(), 11);
    running.stop().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn new_server_identity_reloads_the_page() {
    let (running, peer) = loaded().await;
    peer.drop_connection("restart");
    settle(&running.handle).await;
    let next = running.connector.last_peer();
    next.open();
    next.send_text(SERVER_B);
    settle(&running.handle).await;
    assert_notified!(running.view, Notification::Snackbar { action: Some(_), .. });
    assert_not_notified!(running.view, Notification::ReloadPage);

    sleep(Duration::from_millis(5000)).await;
    settle(&running.handle).await;
    assert_notified!(running.view, Notification::ReloadPage);
    running.stop().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn same_server_after_reconnect_is_not_reloaded() {
    let (running, peer) = loaded().await;
    peer.drop_connection("blip");
    settle(&running.handle).await;
    let next = running.connector.last_peer();
    next.open();
    next.send_text(SERVER_A);
    settle(&running.handle).await;
    sleep(Duration::from_secs(6)).await;
    settle(&running.handle).await;
    assert_not_notified!(running.view, Notification::ReloadPage);
    running.stop().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn wrong_cluster_node_is_retried_then_fatal() {
    let cfg = config().with_routing(Some("route-1".to_owned()), Some("srv-b".to_owned()));
    let running = start(cfg);
    settle(&running.handle).await;

    for attempt in 1..=3 {
        let peer = running.connector.last_peer();
        peer.open();
        peer.send_text(SERVER_A);
        settle(&running.handle).await;
        assert!(peer.sent_starting_with("routetokensanitycheck"), "attempt {attempt}");
        assert_notified!(running.view, Notification::Busy { message } if message == strings::WRONG_SERVER);
        sleep(Duration::from_millis(3000)).await;
        settle(&running.handle).await;
        assert_eq!(running.connector.connect_count(), attempt + 1);
    }

    let peer = running.connector.last_peer();
    peer.open();
    peer.send_text(SERVER_A);
    let snapshot = settle(&running.handle).await;
    assert_eq!(snapshot.recovery, RecoveryState::Fatal);
    assert_notified!(running.view, Notification::Fatal { message } if message.contains("route-1"));
    running.stop().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn fatal_session_stays_quiet() {
    let (running, peer) = loaded().await;
    peer.send_text("error: cmd=internal kind=diskfull");
    let snapshot = settle(&running.handle).await;
    assert_eq!(snapshot.recovery, RecoveryState::Fatal);
    assert_eq!(snapshot.retry_deadline, None);
    let sent = peer.sent_text().len();

    running.handle.send_message("uno .uno:Save").expect("actor running");
    running.handle.activate().expect("actor running");
    running.handle.connect(None).expect("actor running");
    peer.drop_connection("gone");
    sleep(Duration::from_secs(30)).await;
    let snapshot = settle(&running.handle).await;

    assert_eq!(snapshot.recovery, RecoveryState::Fatal);
    assert_eq!(running.connector.connect_count(), 1);
    assert_eq!(peer.sent_text().len(), sent);
    let fatal = running
        .view
        .notifications()
        .into_iter()
        .filter(|n| matches!(n, Notification::Fatal { .. }))
        .count();
    assert_eq!(fatal, 1);
    running.stop().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn close_before_first_load_is_reported() {
    let running = start(config());
    settle(&running.handle).await;
    let peer = running.connector.last_peer();
    peer.open();
    peer.drop_connection("error: cmd=storage kind=loadfailed");
    let snapshot = settle(&running.handle).await;
    assert_eq!(snapshot.recovery, RecoveryState::Fatal);
    assert_notified!(
        running.view,
        Notification::PostMessage { id, values } if id == "Action_Load_Resp"
            && values["errorType"] == "websocketloadfailed"
    );
    assert_notified!(
        running.view,
        Notification::Fatal { message } if message.contains("wopi.example:8443")
    );
    running.stop().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn idle_close_waits_for_activity() {
    let (running, peer) = loaded().await;
    peer.send_text("close: idle");
    settle(&running.handle).await;
    peer.drop_connection("idle");
    let snapshot = settle(&running.handle).await;
    assert_eq!(snapshot.reconnect_period, None);
    assert_notified!(running.view, Notification::Dim);
    sleep(Duration::from_secs(30)).await;
    assert_eq!(running.connector.connect_count(), 1);

    running.handle.activate().expect("actor running");
    settle(&running.handle).await;
    assert_eq!(running.connector.connect_count(), 2);
    running.stop().await;
}
