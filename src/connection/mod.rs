//! The current connection of a session.
//!
//! A [`Connection`] pairs one socket with the outbound queue that buffers
//! messages until that socket opens. Closing a connection rebinds the
//! socket to a detached sink first, so nothing the old socket reports
//! afterwards can reach the session.

mod endpoint;
mod expiry;
mod handshake;

pub use endpoint::{URI_COMPONENT, encode_component, socket_url};
pub use expiry::{ExpiryWarning, REPEAT_EVERY, WARN_AHEAD};
pub use handshake::{LoadRequest, WallClock, client_hello};
use log::{debug, warn};
use url::Url;

use crate::{
    outbound::{OutboundError, OutboundMessage, OutboundQueue},
    transport::{Connector, EventSink, ReadyState, Socket, TransportError},
};

/// One socket plus the state tied to its lifetime.
#[derive(Debug)]
pub struct Connection {
    generation: u64,
    socket: Box<dyn Socket>,
    outbound: OutboundQueue,
    closed: bool,
}

impl Connection {
    /// Open a new socket to `url`.
    ///
    /// # Errors
    ///
    /// Returns the connector's [`TransportError`] if the socket cannot be
    /// constructed.
    pub fn open(connector: &dyn Connector, url: &Url, sink: EventSink) -> Result<Self, TransportError> {
        let generation = sink.generation();
        let socket = connector.connect(url, sink)?;
        debug!("connection created: generation={generation}, url={url}");
        Ok(Self::with_socket(generation, socket))
    }

    /// Take over a socket created elsewhere, rebinding its events to `sink`.
    #[must_use]
    pub fn adopt(mut socket: Box<dyn Socket>, sink: EventSink) -> Self {
        let generation = sink.generation();
        socket.rebind(sink);
        debug!(
            "connection adopted: generation={generation}, state={:?}",
            socket.ready_state()
        );
        Self::with_socket(generation, socket)
    }

    fn with_socket(generation: u64, socket: Box<dyn Socket>) -> Self {
        Self {
            generation,
            socket,
            outbound: OutboundQueue::new(),
            closed: false,
        }
    }

    /// Generation tag carried by this connection's events.
    #[must_use]
    pub fn generation(&self) -> u64 { self.generation }

    /// State of the underlying socket.
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        if self.closed {
            ReadyState::Closed
        } else {
            self.socket.ready_state()
        }
    }

    /// Whether the connection was closed by either side.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.closed }

    /// Send `message` immediately.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotOpen`] if the connection is closed, or
    /// whatever the socket reports.
    pub fn send(&mut self, message: OutboundMessage) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::NotOpen);
        }
        self.socket.send(message)
    }

    /// Buffer `message` until the socket opens.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError::Drained`] once the queue has been flushed.
    pub fn enqueue(&mut self, message: OutboundMessage) -> Result<(), OutboundError> {
        self.outbound.push(message)
    }

    /// Number of messages waiting for the socket to open.
    #[must_use]
    pub fn queued(&self) -> usize { self.outbound.len() }

    /// Send every queued message, in order. Called once, right after open.
    ///
    /// Returns how many messages were written.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError::Drained`] if the queue was already flushed.
    pub fn flush(&mut self) -> Result<usize, OutboundError> {
        let mut sent = 0;
        for message in self.outbound.drain()? {
            match self.socket.send(message) {
                Ok(()) => sent += 1,
                Err(e) => warn!(
                    "queued message dropped: generation={}, error={e}",
                    self.generation
                ),
            }
        }
        Ok(sent)
    }

    /// Hand over messages that never reached this socket.
    ///
    /// Used when the connection is replaced before it opened; the queue is
    /// left drained.
    pub fn take_unsent(&mut self) -> Vec<OutboundMessage> {
        self.outbound
            .drain()
            .map(|pending| pending.collect())
            .unwrap_or_default()
    }

    /// Detach event delivery, then close the socket.
    ///
    /// Returns `false` if the connection was already closed.
    pub fn close(&mut self, code: Option<u16>, reason: Option<&str>) -> bool {
        if self.closed {
            return false;
        }
        self.socket.rebind(EventSink::detached());
        self.socket.close(code, reason);
        self.mark_closed();
        debug!(
            "connection closed locally: generation={}, code={code:?}",
            self.generation
        );
        true
    }

    /// Record that the peer closed the socket.
    pub fn mark_closed(&mut self) { self.closed = true; }
}
