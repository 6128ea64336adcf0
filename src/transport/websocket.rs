//! WebSocket connector backed by `tokio-tungstenite`.
//!
//! Each socket is driven by one spawned task that owns the stream. The
//! [`Socket`] handle talks to it over an unbounded command channel and
//! reads its state from an atomic, so every handle method is synchronous.

use std::sync::{
    Arc,
    Mutex,
    PoisonError,
    atomic::{AtomicU8, Ordering},
};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::{runtime::Handle, sync::mpsc};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use url::Url;

use super::{CloseEvent, Connector, EventSink, ReadyState, Socket, SocketEvent, TransportError};
use crate::{frame::RawFrame, outbound::OutboundMessage};

/// Opens real WebSocket connections.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebSocketConnector;

#[derive(Debug)]
enum Command {
    Send(OutboundMessage),
    Close { code: Option<u16>, reason: String },
}

type SharedSink = Arc<Mutex<EventSink>>;

#[derive(Debug)]
struct WebSocket {
    state: Arc<AtomicU8>,
    sink: SharedSink,
    commands: mpsc::UnboundedSender<Command>,
}

impl Connector for WebSocketConnector {
    fn connect(&self, url: &Url, sink: EventSink) -> Result<Box<dyn Socket>, TransportError> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TransportError::UnsupportedEndpoint(url.to_string()));
        }
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let state = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));
        let sink = Arc::new(Mutex::new(sink));
        let (commands, rx) = mpsc::unbounded_channel();
        runtime.spawn(drive(
            url.clone(),
            Arc::clone(&state),
            Arc::clone(&sink),
            rx,
        ));
        Ok(Box::new(WebSocket {
            state,
            sink,
            commands,
        }))
    }
}

impl Socket for WebSocket {
    fn ready_state(&self) -> ReadyState { ReadyState::from_u8(self.state.load(Ordering::Acquire)) }

    fn send(&mut self, message: OutboundMessage) -> Result<(), TransportError> {
        if self.ready_state() != ReadyState::Open {
            return Err(TransportError::NotOpen);
        }
        self.commands
            .send(Command::Send(message))
            .map_err(|_| TransportError::TaskGone)
    }

    fn close(&mut self, code: Option<u16>, reason: Option<&str>) {
        for live in [ReadyState::Connecting, ReadyState::Open] {
            let _ = self.state.compare_exchange(
                live as u8,
                ReadyState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
        let _ = self.commands.send(Command::Close {
            code,
            reason: reason.unwrap_or_default().to_owned(),
        });
    }

    fn rebind(&mut self, sink: EventSink) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = sink;
    }
}

fn emit(sink: &SharedSink, event: SocketEvent) {
    let sink = sink.lock().unwrap_or_else(PoisonError::into_inner).clone();
    sink.emit(event);
}

/// Report a WebSocket failure to the session.
fn report(sink: &SharedSink, error: tokio_tungstenite::tungstenite::Error) {
    let error = TransportError::from(Box::new(error));
    emit(sink, SocketEvent::Error(error.to_string()));
}

fn to_ws(message: OutboundMessage) -> Message {
    match message {
        OutboundMessage::Text(text) => Message::Text(text),
        OutboundMessage::Binary(bytes) => Message::Binary(bytes.to_vec()),
    }
}

fn close_frame(code: Option<u16>, reason: String) -> Option<CloseFrame<'static>> {
    code.map(|code| CloseFrame {
        code: CloseCode::from(code),
        reason: reason.into(),
    })
}

async fn drive(
    url: Url,
    state: Arc<AtomicU8>,
    sink: SharedSink,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            warn!("websocket connect failed: url={url}, error={e}");
            state.store(ReadyState::Closed as u8, Ordering::Release);
            report(&sink, e);
            emit(&sink, SocketEvent::Closed(CloseEvent::abnormal()));
            return;
        }
    };
    let (mut write, mut read) = stream.split();

    let opened = state
        .compare_exchange(
            ReadyState::Connecting as u8,
            ReadyState::Open as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .is_ok();
    if opened {
        debug!("websocket opened: url={url}");
        emit(&sink, SocketEvent::Opened);
    }

    let close = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(message)) => {
                    if let Err(e) = write.send(to_ws(message)).await {
                        report(&sink, e);
                        break CloseEvent::abnormal();
                    }
                }
                Some(Command::Close { code, reason }) => {
                    let _ = write.send(Message::Close(close_frame(code, reason))).await;
                }
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    break CloseEvent::abnormal();
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => emit(&sink, SocketEvent::Frame(RawFrame::Text(text))),
                Some(Ok(Message::Binary(data))) => {
                    emit(&sink, SocketEvent::Frame(RawFrame::Binary(Bytes::from(data))));
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame.map_or_else(CloseEvent::default, |f| CloseEvent {
                        code: Some(u16::from(f.code)),
                        reason: f.reason.into_owned(),
                    });
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    report(&sink, e);
                    break CloseEvent::abnormal();
                }
                None => break CloseEvent::abnormal(),
            },
        }
    };
    state.store(ReadyState::Closed as u8, Ordering::Release);
    debug!("websocket closed: url={url}, code={:?}", close.code);
    emit(&sink, SocketEvent::Closed(close));
}
