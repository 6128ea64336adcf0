//! Utilities for driving a [`SessionActor`](docwire::SessionActor) against
//! in-memory sockets during tests.
//!
//! [`MockConnector`] hands out sockets whose far end is a [`MockPeer`]; the
//! test plays the server through the peer. [`RecordingView`] captures every
//! notification, permission change and delivered document message.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use docwire::{SessionActor, SessionConfig};
//! use docwire_testing::{MockConnector, RecordingView};
//!
//! # async fn example() {
//! let connector = MockConnector::new();
//! let view = RecordingView::new();
//! let cfg = SessionConfig::new("wss://office.example", "https://wopi.example/files/1");
//! let (actor, handle) = SessionActor::new(cfg, view.clone(), Arc::new(connector.clone()));
//! actor.spawn();
//! handle.connect(None).unwrap();
//! # }
//! ```

pub mod logging;
pub mod macros;
pub mod mock;
pub mod view;

pub use logging::{LoggerHandle, logger};
pub use mock::{MockConnector, MockPeer, settle};
pub use view::RecordingView;
