//! In-memory sockets for driving a session without a network.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use docwire::{
    CloseEvent,
    Connector,
    EventSink,
    OutboundMessage,
    ReadyState,
    SessionHandle,
    SessionSnapshot,
    Socket,
    transport::TransportError,
};
use url::Url;

#[derive(Debug)]
struct PeerState {
    url: Url,
    ready: ReadyState,
    sink: EventSink,
    sent: Vec<OutboundMessage>,
    close_request: Option<(Option<u16>, Option<String>)>,
}

/// Server side of a [`MockSocket`].
///
/// Everything the test pushes through a peer reaches the session through
/// whatever sink the socket is currently bound to.
#[derive(Clone, Debug)]
pub struct MockPeer {
    state: Arc<Mutex<PeerState>>,
}

impl MockPeer {
    fn lock(&self) -> MutexGuard<'_, PeerState> { self.state.lock().expect("peer poisoned") }

    /// URL the client connected to.
    #[must_use]
    pub fn url(&self) -> Url { self.lock().url.clone() }

    /// Current socket state.
    #[must_use]
    pub fn ready_state(&self) -> ReadyState { self.lock().ready }

    /// Complete the handshake.
    pub fn open(&self) {
        let mut state = self.lock();
        state.ready = ReadyState::Open;
        state.sink.opened();
    }

    /// Push a text frame to the client.
    pub fn send_text(&self, text: &str) { self.lock().sink.frame(text); }

    /// Push a binary frame to the client.
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) { self.lock().sink.frame(data.into()); }

    /// Push several text frames in order.
    pub fn send_all(&self, frames: &[&str]) {
        let state = self.lock();
        for frame in frames {
            state.sink.frame(*frame);
        }
    }

    /// Drop the connection from the server side with `reason`.
    pub fn drop_connection(&self, reason: &str) {
        let mut state = self.lock();
        state.ready = ReadyState::Closed;
        state.sink.closed(CloseEvent::with_reason(reason));
    }

    /// Report a socket error without closing.
    pub fn fail(&self, message: &str) { self.lock().sink.error(message); }

    /// Text messages the client sent, in order.
    #[must_use]
    pub fn sent_text(&self) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .filter_map(|m| m.as_text().map(str::to_owned))
            .collect()
    }

    /// Whether the client sent a message starting with `prefix`.
    #[must_use]
    pub fn sent_starting_with(&self, prefix: &str) -> bool {
        self.sent_text().iter().any(|m| m.starts_with(prefix))
    }

    /// Close requested by the client, if any.
    #[must_use]
    pub fn close_request(&self) -> Option<(Option<u16>, Option<String>)> { self.lock().close_request.clone() }

    /// Whether the client still listens to this socket.
    #[must_use]
    pub fn is_attached(&self) -> bool { self.lock().sink.is_attached() }
}

/// Client side handed to the session.
#[derive(Debug)]
struct MockSocket {
    peer: MockPeer,
}

impl Socket for MockSocket {
    fn ready_state(&self) -> ReadyState { self.peer.lock().ready }

    fn send(&mut self, message: OutboundMessage) -> Result<(), TransportError> {
        let mut state = self.peer.lock();
        if state.ready != ReadyState::Open {
            return Err(TransportError::NotOpen);
        }
        state.sent.push(message);
        Ok(())
    }

    fn close(&mut self, code: Option<u16>, reason: Option<&str>) {
        let mut state = self.peer.lock();
        state.ready = ReadyState::Closed;
        state.close_request = Some((code, reason.map(str::to_owned)));
        state.sink.closed(CloseEvent {
            code,
            reason: reason.unwrap_or_default().to_owned(),
        });
    }

    fn rebind(&mut self, sink: EventSink) { self.peer.lock().sink = sink; }
}

#[derive(Debug, Default)]
struct ConnectorState {
    peers: Vec<MockPeer>,
    fail_next: usize,
}

/// Connector producing [`MockSocket`]s and remembering their peers.
#[derive(Clone, Debug, Default)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    /// Create a connector with no sockets yet.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn lock(&self) -> MutexGuard<'_, ConnectorState> { self.state.lock().expect("connector poisoned") }

    /// Number of sockets created so far.
    #[must_use]
    pub fn connect_count(&self) -> usize { self.lock().peers.len() }

    /// Peer of the `index`-th socket.
    ///
    /// # Panics
    ///
    /// Panics if fewer sockets were created.
    #[must_use]
    pub fn peer(&self, index: usize) -> MockPeer {
        self.lock()
            .peers
            .get(index)
            .cloned()
            .unwrap_or_else(|| panic!("no socket #{index} was created"))
    }

    /// Peer of the most recent socket.
    ///
    /// # Panics
    ///
    /// Panics if no socket was created.
    #[must_use]
    pub fn last_peer(&self) -> MockPeer {
        self.lock().peers.last().cloned().expect("no socket was created")
    }

    /// Make the next `count` connection attempts fail.
    pub fn fail_next(&self, count: usize) { self.lock().fail_next = count; }

    /// Build a socket outside any session, e.g. to test adoption.
    #[must_use]
    pub fn detached_socket(&self, url: &str, ready: ReadyState) -> (Box<dyn Socket>, MockPeer) {
        let peer = MockPeer {
            state: Arc::new(Mutex::new(PeerState {
                url: Url::parse(url).expect("valid url"),
                ready,
                sink: EventSink::detached(),
                sent: Vec::new(),
                close_request: None,
            })),
        };
        (Box::new(MockSocket { peer: peer.clone() }), peer)
    }
}

impl Connector for MockConnector {
    fn connect(&self, url: &Url, sink: EventSink) -> Result<Box<dyn Socket>, TransportError> {
        let mut state = self.lock();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(TransportError::UnsupportedEndpoint(url.to_string()));
        }
        let peer = MockPeer {
            state: Arc::new(Mutex::new(PeerState {
                url: url.clone(),
                ready: ReadyState::Connecting,
                sink,
                sent: Vec::new(),
                close_request: None,
            })),
        };
        state.peers.push(peer.clone());
        Ok(Box::new(MockSocket { peer }))
    }
}

/// Let pending emission timers fire, then wait until the actor has handled
/// everything queued so far.
///
/// Meant for tests running on a paused clock, where sleeping advances time
/// instantly.
///
/// # Panics
///
/// Panics if the actor has stopped.
pub async fn settle(handle: &SessionHandle) -> SessionSnapshot {
    handle.snapshot().await.expect("actor running");
    tokio::time::sleep(Duration::from_millis(60)).await;
    handle.snapshot().await.expect("actor running")
}
