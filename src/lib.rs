#![doc(html_root_url = "https://docs.rs/docwire/latest")]
//! Public API for the `docwire` library.
//!
//! This crate is the client-side session engine of a collaborative document
//! server: it keeps one WebSocket connection per document view alive,
//! batches inbound frames for rendering, routes them to handlers and
//! recovers from disconnects, server restarts and user-actionable errors.
//!
//! A host builds a [`SessionActor`] with its [`View`] implementation and a
//! [`transport::Connector`], spawns it, and drives it through the returned
//! [`SessionHandle`].

mod actor;
pub mod command;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod message;
pub mod metrics;
pub mod outbound;
pub mod recovery;
pub mod session;
pub mod slurp;
pub mod strings;
pub mod transport;
pub mod view;

pub use actor::{SessionActor, SessionHandle, SessionSnapshot};
pub use command::ServerCommand;
pub use config::{ConfigError, DocumentConfig, SessionConfig};
pub use dispatch::{DispatchError, Flow};
pub use error::{Result, SessionError};
pub use frame::{FrameImage, InboundFrame, RawFrame};
pub use message::Message;
pub use metrics::{BATCHES_EMITTED, CONNECT_ATTEMPTS, FRAMES_DISPATCHED, HANDLER_FAILURES};
pub use outbound::OutboundMessage;
pub use recovery::{RecoveryConfig, RecoveryState, RetryCategory};
pub use session::{Permission, Session};
pub use slurp::{SlurpConfig, SlurpState};
pub use transport::{CloseEvent, Connector, EventSink, ReadyState, Socket, WebSocketConnector};
pub use view::{ConflictResolution, DocumentMessage, Notification, PasswordKind, TransactionDone, View};
