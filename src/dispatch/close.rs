//! `close:` reasons announced by the server before it drops the socket.

use log::{info, warn};
use serde_json::json;
use tokio::time::Instant;

use super::Flow;
use crate::{
    actor::SessionActor,
    recovery::RetryAction,
    strings,
    view::{Notification, View},
};

impl<V: View> SessionActor<V> {
    pub(super) fn on_close_message(&mut self, reason: &str) -> Flow {
        info!("server closing session: reason={reason}");
        match reason {
            "ownertermination" => {
                self.post_session_closed("OwnerTermination");
                self.view.notify(Notification::SessionTerminated);
                self.recovery.mark_fatal();
                self.session.active = false;
                self.close_connection(None, None);
                self.suspended_expiry = None;
                Flow::Halt
            }
            "idle" | "oom" => {
                self.session.document_idle = true;
                self.view.notify(Notification::Dim);
                self.view.notify(Notification::DiscardTileCache);
                self.post_session_closed(if reason == "oom" { "OOM" } else { "DocumentIdle" });
                Flow::Consumed
            }
            "shuttingdown" => {
                self.session.active = false;
                self.session.server_recycling = true;
                self.post_session_closed("ShuttingDown");
                Flow::Consumed
            }
            "docdisconnected" => {
                self.post_session_closed("DocumentDisconnected");
                Flow::Consumed
            }
            "recycling" => {
                self.session.active = false;
                self.session.server_recycling = true;
                let (period, first) = self.recovery.recycling(Instant::now());
                info!("server recycling: retry_period={period:?}");
                if first {
                    self.view.notify(Notification::Busy {
                        message: strings::RECONNECTING.to_owned(),
                    });
                }
                Flow::Consumed
            }
            _ if reason.starts_with("documentconflict") || reason.starts_with("reloadafterrename") => {
                self.reload_document();
                Flow::Consumed
            }
            _ if reason.starts_with("versionrestore:") => {
                if reason["versionrestore:".len()..].trim() == "prerestore_ack" {
                    self.view.notify(Notification::post(
                        "App_VersionRestore",
                        json!({"Status": "Pre_Restore_Ack"}),
                    ));
                    self.reload_document();
                }
                Flow::Consumed
            }
            _ => {
                warn!("unknown close reason: reason={reason}");
                Flow::Consumed
            }
        }
    }

    /// Drop the connection and reopen the document after a short delay.
    fn reload_document(&mut self) {
        self.close_connection(None, None);
        self.session.active = false;
        let delay = self.recovery.config().document_reload_delay;
        self.recovery
            .schedule_reload(delay, RetryAction::Reconnect, Instant::now());
    }

    fn post_session_closed(&mut self, reason: &str) {
        self.view
            .notify(Notification::post("Session_Closed", json!({"Reason": reason})));
    }
}
