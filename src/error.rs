//! Canonical error and result types for the crate.
//!
//! Each layer owns a narrow `thiserror` enum; [`SessionError`] wraps them
//! for callers that drive a whole session.

use thiserror::Error;

use crate::{
    config::ConfigError,
    dispatch::DispatchError,
    outbound::OutboundError,
    transport::TransportError,
};

/// Top-level error type exposed by `docwire`.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The socket could not be created or failed mid-flight.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A message could not be queued for delivery.
    #[error(transparent)]
    Outbound(#[from] OutboundError),
    /// A frame handler rejected its input.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// The session configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The session actor is no longer running.
    #[error("session closed")]
    Closed,
}

/// Result type used throughout the public API.
pub type Result<T, E = SessionError> = std::result::Result<T, E>;
