//! Log records emitted over a session's lifetime.

mod common;

use common::{config, loaded, start};
use docwire_testing::{LoggerHandle, logger, settle};
use rstest::rstest;

#[rstest]
#[tokio::test(start_paused = true)]
async fn lifecycle_is_logged(mut logger: LoggerHandle) {
    let (running, peer) = loaded().await;
    peer.drop_connection("network");
    settle(&running.handle).await;
    running.stop().await;

    assert!(logger.contains("session started: document="));
    assert!(logger.contains("socket opened: generation=1"));
    assert!(logger.contains("socket closed: generation=1"));
    assert!(logger.contains("connecting: generation=2"));
    assert!(logger.contains("session stopped"));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn handler_failures_are_logged(mut logger: LoggerHandle) {
    let (running, peer) = loaded().await;
    peer.send_text("perm: superuser");
    settle(&running.handle).await;
    running.stop().await;
    assert!(logger.contains("frame handler failed: error=unknown permission \"superuser\""));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn fatal_reason_is_logged(mut logger: LoggerHandle) {
    let running = start(config());
    settle(&running.handle).await;
    let peer = running.connector.last_peer();
    peer.open();
    peer.send_text("error: cmd=load kind=faileddocloading");
    settle(&running.handle).await;
    running.stop().await;
    assert!(logger.contains("session failed: reason="));
}
