//! Socket abstraction.
//!
//! The session actor talks to the network through [`Connector`] and
//! [`Socket`]. A socket reports what happens to it through an
//! [`EventSink`] tagged with the generation of the connection that owns
//! it; rebinding the sink to [`EventSink::detached`] silences an old
//! socket before it is closed.

mod websocket;

use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;
pub use websocket::WebSocketConnector;

use crate::{actor::SessionEvent, frame::RawFrame, outbound::OutboundMessage};

/// Close code reported when the socket vanished without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Errors raised by socket implementations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Sockets must be created from inside a Tokio runtime.
    #[error("no async runtime available to drive the socket")]
    NoRuntime,
    /// The endpoint URL cannot be served by this connector.
    #[error("unsupported endpoint {0}")]
    UnsupportedEndpoint(String),
    /// The socket is not open.
    #[error("socket is not open")]
    NotOpen,
    /// The task driving the socket has stopped.
    #[error("socket task stopped")]
    TaskGone,
    /// The WebSocket layer failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),
}

/// Connection state as seen by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    /// Handshake in progress.
    Connecting = 0,
    /// Open for traffic.
    Open = 1,
    /// Close requested, waiting for the peer.
    Closing = 2,
    /// Closed.
    Closed = 3,
}

impl ReadyState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }

    /// Whether the handle is still usable (open or about to be).
    #[must_use]
    pub fn is_live(self) -> bool { matches!(self, ReadyState::Connecting | ReadyState::Open) }
}

/// Details of a socket close.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CloseEvent {
    /// Close code, if the peer sent one.
    pub code: Option<u16>,
    /// Close reason text.
    pub reason: String,
}

impl CloseEvent {
    /// A close with `reason` and no code.
    #[must_use]
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            code: None,
            reason: reason.into(),
        }
    }

    /// A close without a close frame.
    #[must_use]
    pub fn abnormal() -> Self {
        Self {
            code: Some(ABNORMAL_CLOSURE),
            reason: String::new(),
        }
    }
}

/// Something that happened to a socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketEvent {
    /// The socket opened.
    Opened,
    /// A frame arrived.
    Frame(RawFrame),
    /// The socket reported an error; a close usually follows.
    Error(String),
    /// The socket closed.
    Closed(CloseEvent),
}

/// Delivery endpoint for socket events.
#[derive(Clone, Debug)]
pub struct EventSink {
    generation: u64,
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            generation,
            tx: Some(tx),
        }
    }

    /// A sink that drops everything.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            generation: 0,
            tx: None,
        }
    }

    /// Generation of the connection this sink reports for.
    #[must_use]
    pub fn generation(&self) -> u64 { self.generation }

    /// Whether events still reach a session.
    #[must_use]
    pub fn is_attached(&self) -> bool { self.tx.as_ref().is_some_and(|tx| !tx.is_closed()) }

    /// Report an event. Returns `false` if nobody is listening.
    pub fn emit(&self, event: SocketEvent) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        tx.send(SessionEvent::Socket {
            generation: self.generation,
            event,
        })
        .is_ok()
    }

    /// Report that the socket opened.
    pub fn opened(&self) -> bool { self.emit(SocketEvent::Opened) }

    /// Report an inbound frame.
    pub fn frame(&self, frame: impl Into<RawFrame>) -> bool { self.emit(SocketEvent::Frame(frame.into())) }

    /// Report a socket error.
    pub fn error(&self, message: impl Into<String>) -> bool {
        self.emit(SocketEvent::Error(message.into()))
    }

    /// Report that the socket closed.
    pub fn closed(&self, close: CloseEvent) -> bool { self.emit(SocketEvent::Closed(close)) }
}

/// A bidirectional message socket.
pub trait Socket: Send + std::fmt::Debug {
    /// Current state.
    fn ready_state(&self) -> ReadyState;

    /// Send a message on an open socket.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotOpen`] if the socket is not open.
    fn send(&mut self, message: OutboundMessage) -> Result<(), TransportError>;

    /// Request a close. Code and reason are passed through to the peer.
    fn close(&mut self, code: Option<u16>, reason: Option<&str>);

    /// Route future events to `sink`.
    fn rebind(&mut self, sink: EventSink);
}

/// Factory for sockets.
pub trait Connector: Send + Sync {
    /// Start connecting to `url`, reporting events to `sink`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the socket cannot be constructed.
    fn connect(&self, url: &Url, sink: EventSink) -> Result<Box<dyn Socket>, TransportError>;
}
