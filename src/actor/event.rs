//! Inputs of the session actor.

use tokio::sync::oneshot;

use super::SessionSnapshot;
use crate::{
    outbound::OutboundMessage,
    slurp::TransactionId,
    transport::{Socket, SocketEvent},
    view::ConflictResolution,
};

/// Everything that reaches the actor through its channel.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    /// Something happened to the socket of connection `generation`.
    Socket { generation: u64, event: SocketEvent },
    /// The host asked for something.
    Command(HostCommand),
    /// An image decode finished.
    ImageSettled,
    /// The view finished a render transaction.
    TransactionComplete(TransactionId),
}

/// Requests made through a [`SessionHandle`](super::SessionHandle).
#[derive(Debug)]
pub(crate) enum HostCommand {
    Connect(Option<Box<dyn Socket>>),
    Send(OutboundMessage),
    Activate,
    Deactivate,
    SubmitPassword(String),
    CancelPassword,
    ResolveConflict(ConflictResolution),
    AnswerSaveAs(bool),
    Close { code: Option<u16>, reason: Option<String> },
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// What the select loop woke up for.
#[derive(Debug)]
pub(super) enum Wake {
    Shutdown,
    SlurpDue,
    RetryDue,
    ExpiryDue,
    Event(SessionEvent),
}
