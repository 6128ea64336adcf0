//! Cloneable handle used by the host to drive a session.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::{
    SessionSnapshot,
    event::{HostCommand, SessionEvent},
};
use crate::{
    error::{Result, SessionError},
    outbound::OutboundMessage,
    transport::Socket,
    view::ConflictResolution,
};

/// Host-side handle to a running [`SessionActor`](super::SessionActor).
///
/// Every method only enqueues a request; the actor applies requests in the
/// order they were made, interleaved with socket events.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
    shutdown: CancellationToken,
}

impl SessionHandle {
    pub(super) fn new(tx: mpsc::UnboundedSender<SessionEvent>, shutdown: CancellationToken) -> Self {
        Self { tx, shutdown }
    }

    fn command(&self, command: HostCommand) -> Result<()> {
        self.tx
            .send(SessionEvent::Command(command))
            .map_err(|_| SessionError::Closed)
    }

    /// Connect, adopting `existing` if it is still open or connecting.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the actor has stopped.
    pub fn connect(&self, existing: Option<Box<dyn Socket>>) -> Result<()> {
        self.command(HostCommand::Connect(existing))
    }

    /// Send a message to the server, queueing it while the socket opens.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the actor has stopped.
    pub fn send_message(&self, message: impl Into<OutboundMessage>) -> Result<()> {
        self.command(HostCommand::Send(message.into()))
    }

    /// Report user activity; reconnects if the session was disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the actor has stopped.
    pub fn activate(&self) -> Result<()> { self.command(HostCommand::Activate) }

    /// Report that the user went idle.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the actor has stopped.
    pub fn deactivate(&self) -> Result<()> { self.command(HostCommand::Deactivate) }

    /// Answer a password prompt and reload the document.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the actor has stopped.
    pub fn submit_password(&self, password: impl Into<String>) -> Result<()> {
        self.command(HostCommand::SubmitPassword(password.into()))
    }

    /// Dismiss a password prompt.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the actor has stopped.
    pub fn cancel_password(&self) -> Result<()> { self.command(HostCommand::CancelPassword) }

    /// Answer a document-conflict prompt.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the actor has stopped.
    pub fn resolve_conflict(&self, resolution: ConflictResolution) -> Result<()> {
        self.command(HostCommand::ResolveConflict(resolution))
    }

    /// Answer a "saved under a new name, join?" prompt.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the actor has stopped.
    pub fn accept_save_as(&self, join: bool) -> Result<()> { self.command(HostCommand::AnswerSaveAs(join)) }

    /// Close the connection. A later [`send_message`](Self::send_message)
    /// or [`activate`](Self::activate) reconnects.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the actor has stopped.
    pub fn close(&self, code: Option<u16>, reason: Option<&str>) -> Result<()> {
        self.command(HostCommand::Close {
            code,
            reason: reason.map(str::to_owned),
        })
    }

    /// Capture the actor's current state.
    ///
    /// The snapshot is taken after every request and event queued before
    /// this call has been handled.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the actor has stopped.
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.command(HostCommand::Snapshot(tx))?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Stop the actor, closing the connection.
    pub fn shutdown(&self) { self.shutdown.cancel(); }

    /// Whether the actor has stopped or was asked to.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.shutdown.is_cancelled() || self.tx.is_closed() }
}
