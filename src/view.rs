//! Collaborator interface of the view and UI layers.
//!
//! The engine never renders anything itself. It asks the [`View`] for a
//! render-cost prediction, brackets each batch in a render transaction,
//! forwards document messages and reports user-facing events as
//! [`Notification`] values.

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{
    actor::SessionEvent,
    frame::FrameImage,
    session::Permission,
    slurp::TransactionId,
};

/// Which password the server asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PasswordKind {
    /// Needed to open the document at all.
    ToView,
    /// Needed to edit; cancelling opens read-only.
    ToModify,
    /// The previous password was wrong.
    Retry,
}

/// The user's answer to [`Notification::DocumentConflict`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Keep the storage version and drop local changes.
    Discard,
    /// Overwrite the storage version.
    Overwrite,
    /// Save local changes under a new file name.
    SaveToNewFile(String),
    /// Dismiss the prompt.
    Cancel,
}

/// Action offered next to a snackbar message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnackbarAction {
    /// Reload the client now.
    Reload,
}

/// User-facing event emitted by the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// Terminal error; the session is unusable.
    Fatal {
        /// Message to show.
        message: String,
    },
    /// Non-terminal error dialog.
    Error {
        /// Message to show.
        message: String,
    },
    /// Warning dialog.
    Warn {
        /// Message to show.
        message: String,
    },
    /// Busy overlay.
    Busy {
        /// Message to show.
        message: String,
    },
    /// Remove the busy overlay.
    HideBusy,
    /// Transient message at the bottom of the screen.
    Snackbar {
        /// Message to show.
        message: String,
        /// Optional action button.
        action: Option<SnackbarAction>,
    },
    /// Persistent information bar.
    Infobar {
        /// Message to show.
        message: String,
        /// Link target of the action.
        link: String,
    },
    /// Generic modal dialog.
    Modal {
        /// Dialog identifier.
        id: String,
        /// Dialog title.
        title: String,
        /// Dialog body.
        message: String,
    },
    /// Block user input.
    BlockUi {
        /// Optional explanation.
        message: Option<String>,
    },
    /// Unblock user input.
    UnblockUi,
    /// Message for the embedding host (`postMessage`).
    PostMessage {
        /// Message identifier.
        id: String,
        /// Message arguments.
        values: Value,
    },
    /// Whether the document is loaded and usable.
    DocumentLoaded(bool),
    /// Ask the user for a password.
    PasswordPrompt {
        /// What the password unlocks.
        kind: PasswordKind,
        /// Prompt text.
        message: String,
    },
    /// Another party modified the document; ask how to resolve it.
    DocumentConflict {
        /// Whether saving to a new file is allowed.
        save_to_new_file: bool,
    },
    /// Another user saved the document under a new name.
    SaveAsJoin {
        /// Who saved it.
        username: String,
        /// The new file name.
        filename: String,
    },
    /// A command is locked behind an upgrade.
    UnlockPrompt {
        /// The locked command.
        command: String,
    },
    /// Reload the whole client.
    ReloadPage,
    /// Dim the document after an idle disconnect.
    Dim,
    /// Drop cached tiles.
    DiscardTileCache,
    /// Progress indicator update.
    StatusIndicator(Value),
    /// WOPI properties of the document.
    WopiProperties(Value),
    /// Document lock could not be taken.
    LockFailed(String),
    /// Locked features.
    FeatureLocks(Value),
    /// Restricted commands.
    Restrictions(Value),
    /// Clipboard key for this view.
    ClipboardKey(String),
    /// Last modification time of the document.
    ModificationTime(String),
    /// The document was reopened after a disconnect.
    Reconnected,
    /// The owner ended the session; tear the view down.
    SessionTerminated,
}

impl Notification {
    /// Build a host post-message.
    #[must_use]
    pub fn post(id: &str, values: Value) -> Self {
        Notification::PostMessage {
            id: id.to_owned(),
            values,
        }
    }

    /// Build a snackbar without action.
    #[must_use]
    pub fn snackbar(message: impl Into<String>) -> Self {
        Notification::Snackbar {
            message: message.into(),
            action: None,
        }
    }
}

/// Message forwarded to the document layer.
#[derive(Clone, Copy, Debug)]
pub struct DocumentMessage<'a> {
    /// Routed text of the message.
    pub text: &'a str,
    /// Bytes that followed the header, if any.
    pub payload: Option<&'a Bytes>,
    /// Attached image, if any.
    pub image: Option<&'a FrameImage>,
}

impl<'a> DocumentMessage<'a> {
    /// A text-only message.
    #[must_use]
    pub fn text(text: &'a str) -> Self {
        Self {
            text,
            payload: None,
            image: None,
        }
    }
}

/// Completion token handed to [`View::end_render_transaction`].
///
/// Call [`TransactionDone::complete`] once the view has finished its
/// deferred work. Dropping the token completes it as well.
#[derive(Debug)]
pub struct TransactionDone {
    id: TransactionId,
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl TransactionDone {
    pub(crate) fn new(id: TransactionId, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { id, tx: Some(tx) }
    }

    /// Report that the transaction has ended.
    pub fn complete(mut self) { self.send(); }

    fn send(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(SessionEvent::TransactionComplete(self.id));
        }
    }
}

impl Drop for TransactionDone {
    fn drop(&mut self) { self.send(); }
}

/// The rendering and UI side of a session.
pub trait View: Send + 'static {
    /// Predicted cost of rendering pending work, in milliseconds.
    fn predict_render_cost(&self) -> u32;

    /// Start deferring re-layout.
    fn begin_render_transaction(&mut self);

    /// Stop deferring re-layout; complete `done` when finished.
    fn end_render_transaction(&mut self, done: TransactionDone);

    /// Report a user-facing event.
    fn notify(&mut self, notification: Notification);

    /// Permission the view currently displays.
    fn current_permission(&self) -> Permission;

    /// Change the permission the view displays.
    fn set_permission(&mut self, permission: Permission);

    /// Hand a message to the document layer.
    fn deliver(&mut self, message: DocumentMessage<'_>);

    /// Part (sheet, slide, page) currently shown, if meaningful.
    fn current_part(&self) -> Option<u32> { None }
}
