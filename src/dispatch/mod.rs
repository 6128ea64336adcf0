//! Message dispatcher.
//!
//! Every complete frame of a batch is routed on its prefix to one handler.
//! A handler returns a [`Flow`] telling the batch loop whether the frame
//! also goes to the document layer, was fully handled, or must stop the
//! batch because the session now waits on the user or has failed.
//!
//! Handlers are methods on the session actor so they can reach the session
//! state, the view, the connection and the recovery machinery directly. They
//! run one at a time and to completion.

mod close;
mod document;
mod isolate;
mod notices;
mod server;
mod storage;

pub use isolate::{PanicMessage, format_panic};
pub(crate) use notices::{unauthorized_message, with_storage_host};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{
    actor::{Delayed, SessionActor},
    frame::InboundFrame,
    message::Message,
    metrics::{self, Route},
    session::UnknownPermission,
    view::{DocumentMessage, View},
};

/// What the batch loop does after a handler returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Also hand the frame to the document layer.
    Forward,
    /// The engine handled the frame.
    Consumed,
    /// The session now waits on the user or lost its connection; stop
    /// dispatching the current batch.
    Halt,
}

/// Errors raised by a handler for a malformed message.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The JSON body did not decode.
    #[error("malformed {kind} message: {source}")]
    Malformed {
        /// Message kind.
        kind: &'static str,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// A required field was absent.
    #[error("{kind} message lacks {field}")]
    MissingField {
        /// Message kind.
        kind: &'static str,
        /// Missing field.
        field: &'static str,
    },
    /// A permission level was not recognised.
    #[error(transparent)]
    Permission(#[from] UnknownPermission),
}

/// Decode the JSON body of a `kind` message.
pub(crate) fn parse_json<T: DeserializeOwned>(kind: &'static str, body: &str) -> Result<T, DispatchError> {
    serde_json::from_str(body).map_err(|source| DispatchError::Malformed { kind, source })
}

impl<V: View> SessionActor<V> {
    /// Route one frame.
    pub(crate) fn dispatch(&mut self, text: &str, frame: &InboundFrame) -> Result<Flow, DispatchError> {
        let message = Message::parse(text);
        let flow = match message {
            Message::CoolServer(body) => self.on_coolserver(body)?,
            Message::LokitVersion(body) => self.on_lokitversion(body)?,
            Message::EnableTraceEventLogging(_) => {
                self.session.trace_event_logging = true;
                Flow::Forward
            }
            Message::OsInfo(info) => {
                self.session.set_os_info(info);
                Flow::Forward
            }
            Message::ClipboardKey(key) => self.on_clipboard_key(key),
            Message::Perm(level) => self.on_perm(level)?,
            Message::FileMode(body) => self.on_filemode(body)?,
            Message::LockFailed(reason) => self.on_lock_failed(reason),
            Message::Wopi(body) => self.on_wopi(body)?,
            Message::LoadStorage(status) => self.on_load_storage(status),
            Message::LastModTime(time) => self.on_last_mod_time(time),
            Message::CommandResult(body) => self.on_command_result(body)?,
            Message::Migrate(body) => self.on_migrate(body)?,
            Message::Close(reason) => self.on_close_message(reason),
            Message::Error => self.on_error(text),
            Message::FontsMissing(body) => self.on_fonts_missing(body)?,
            Message::Info => self.on_info(text),
            Message::SaveAs | Message::RenameFile => self.on_saved_as(text),
            Message::ExportAs => self.on_exported(text),
            Message::Warn(rest) => self.on_warn(rest),
            Message::BlockUi(reason) => self.on_block_ui(reason),
            Message::UnblockUi => self.on_unblock_ui(),
            Message::FeatureLock(body) => self.on_feature_lock(body)?,
            Message::RestrictedCommands(body) => self.on_restrictions(body)?,
            Message::BlockedCommand(rest) => self.on_blocked_command(rest),
            Message::UpdateRouteToken(token) => self.on_update_route_token(token),
            Message::Reload => self.on_reload(),
            Message::Status(body) => self.on_status(body, text, frame)?,
            Message::Progress(body) => self.on_progress(body)?,
            Message::Document => self.on_document(text),
        };
        metrics::inc_frames(if flow == Flow::Forward {
            Route::Document
        } else {
            Route::Engine
        });
        if flow == Flow::Forward {
            self.forward(text, frame);
        }
        Ok(flow)
    }

    /// Hand a frame to the document layer, or hold it until the document
    /// has loaded.
    fn forward(&mut self, text: &str, frame: &InboundFrame) {
        if !self.session.loaded_once {
            self.delayed.push_back(Delayed {
                text: text.to_owned(),
                frame: frame.clone(),
            });
            return;
        }
        self.view.deliver(DocumentMessage {
            text,
            payload: frame.payload(),
            image: frame.image(),
        });
    }
}
