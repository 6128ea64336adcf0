//! Shared utilities for integration tests.
//!
//! Starts a session actor against a [`MockConnector`] and walks it through
//! the opening handshake so tests can begin from a loaded document.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::sync::Arc;

use docwire::{SessionActor, SessionConfig, SessionHandle, connection::WallClock};
use docwire_testing::{MockConnector, MockPeer, RecordingView, settle};
use tokio::{task::JoinHandle, time::Instant};

/// Document URL used by every test session.
pub const DOCUMENT: &str = "https://wopi.example:8443/wopi/files/1";

/// Greeting of the first server instance.
pub const SERVER_A: &str = r#"coolserver {"Id":"srv-a","Version":"24.04","Hash":"aaa","Protocol":"0.1"}"#;

/// Greeting of a different server instance.
pub const SERVER_B: &str = r#"coolserver {"Id":"srv-b","Version":"24.04","Hash":"bbb","Protocol":"0.1"}"#;

/// Epoch time the session clock starts at (2023-11-14 22:13:20 UTC).
pub const EPOCH_MS_U64: u64 = 1_700_000_000_000;

/// A running session and the doubles around it.
pub struct Running {
    pub handle: SessionHandle,
    pub view: RecordingView,
    pub connector: MockConnector,
    pub task: JoinHandle<()>,
}

impl Running {
    /// Stop the actor and wait for it.
    pub async fn stop(self) {
        self.handle.shutdown();
        self.task.await.expect("actor task");
    }
}

/// Default configuration for test sessions.
pub fn config() -> SessionConfig { SessionConfig::new("wss://office.example", DOCUMENT) }

/// Spawn an actor for `cfg` and ask it to connect.
pub fn start(cfg: SessionConfig) -> Running {
    let connector = MockConnector::new();
    let view = RecordingView::new();
    let (actor, handle) = SessionActor::new(cfg, view.clone(), Arc::new(connector.clone()));
    let task = actor
        .with_rng_seed(7)
        .with_clock(WallClock::anchored(Instant::now(), 1_700_000_000_000.0))
        .spawn();
    handle.connect(None).expect("actor running");
    Running {
        handle,
        view,
        connector,
        task,
    }
}

/// Open the latest socket, greet and load the document.
pub async fn open_and_load(running: &Running) -> MockPeer {
    settle(&running.handle).await;
    let peer = running.connector.last_peer();
    peer.open();
    peer.send_all(&[SERVER_A, "status: {\"type\":\"text\"}"]);
    settle(&running.handle).await;
    peer
}

/// Start a session with the default configuration and load it.
pub async fn loaded() -> (Running, MockPeer) {
    let running = start(config());
    let peer = open_and_load(&running).await;
    (running, peer)
}
