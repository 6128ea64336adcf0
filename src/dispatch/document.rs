//! Document state: permissions, storage properties, readiness and progress.

use std::panic::{AssertUnwindSafe, catch_unwind};

use log::{debug, error, info, warn};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{DispatchError, Flow, format_panic, parse_json};
use crate::{
    actor::SessionActor,
    frame::{InboundFrame, loggable},
    session::Permission,
    strings,
    view::{DocumentMessage, Notification, View},
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FileMode {
    read_only: bool,
    edit_comment: bool,
    manage_redlines: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommandResult {
    command: String,
    success: bool,
    result: Value,
    #[serde(rename = "errorMsg")]
    error_msg: Value,
}

#[derive(Debug, Deserialize)]
struct FontsMissing {
    fontsmissing: Vec<String>,
}

impl<V: View> SessionActor<V> {
    pub(super) fn on_perm(&mut self, level: &str) -> Result<Flow, DispatchError> {
        let requested: Permission = level.parse()?;
        let effective = self.session.narrow_permission(requested);
        debug!("permission: requested={requested}, effective={effective}");
        if self.session.loaded_once {
            self.view.set_permission(effective);
        }
        Ok(Flow::Consumed)
    }

    pub(super) fn on_filemode(&mut self, body: &str) -> Result<Flow, DispatchError> {
        let mode: FileMode = parse_json("filemode", body)?;
        debug!(
            "file mode: read_only={}, edit_comment={}, manage_redlines={}",
            mode.read_only, mode.edit_comment, mode.manage_redlines
        );
        if mode.read_only {
            self.session.narrow_permission(Permission::ReadOnly);
        }
        if self.session.loaded_once {
            self.view.set_permission(self.session.permission());
        }
        Ok(Flow::Forward)
    }

    pub(super) fn on_lock_failed(&mut self, reason: &str) -> Flow {
        warn!("document lock failed: reason={reason}");
        self.view.notify(Notification::LockFailed(reason.to_owned()));
        Flow::Consumed
    }

    pub(super) fn on_wopi(&mut self, body: &str) -> Result<Flow, DispatchError> {
        let properties: Value = parse_json("wopi", body)?;
        if let Some(forbidden) = properties
            .get("UserCanNotWriteRelative")
            .and_then(Value::as_bool)
        {
            self.session.user_can_not_write_relative = forbidden;
        }
        self.view.notify(Notification::WopiProperties(properties));
        Ok(Flow::Consumed)
    }

    pub(super) fn on_load_storage(&mut self, status: &str) -> Flow {
        if status == "failed" {
            debug!("loading the document from storage failed");
            self.view
                .notify(Notification::post("App_LoadingStatus", json!({"Status": "Failed"})));
        }
        Flow::Forward
    }

    pub(super) fn on_last_mod_time(&mut self, time: &str) -> Flow {
        self.view.notify(Notification::ModificationTime(time.to_owned()));
        Flow::Consumed
    }

    pub(super) fn on_command_result(&mut self, body: &str) -> Result<Flow, DispatchError> {
        let result: CommandResult = parse_json("commandresult", body)?;
        let id = match result.command.as_str() {
            "savetostorage" | "save" => "Action_Save_Resp",
            "load" => "Action_Load_Resp",
            other => {
                debug!("command result ignored: command={other}");
                return Ok(Flow::Consumed);
            }
        };
        self.view.notify(Notification::post(
            id,
            json!({
                "success": result.success,
                "result": result.result,
                "errorMsg": result.error_msg,
            }),
        ));
        Ok(Flow::Consumed)
    }

    pub(super) fn on_fonts_missing(&mut self, body: &str) -> Result<Flow, DispatchError> {
        let missing: FontsMissing = parse_json("fontsmissing", body)?;
        info!("fonts missing: count={}", missing.fontsmissing.len());
        self.view.notify(Notification::Modal {
            id: "fontsmissing".to_owned(),
            title: strings::MISSING_FONTS.to_owned(),
            message: format!(" {}", missing.fontsmissing.join(", ")),
        });
        Ok(Flow::Forward)
    }

    pub(super) fn on_feature_lock(&mut self, body: &str) -> Result<Flow, DispatchError> {
        let locks: Value = parse_json("featurelock", body)?;
        self.view.notify(Notification::FeatureLocks(locks));
        Ok(Flow::Consumed)
    }

    pub(super) fn on_restrictions(&mut self, body: &str) -> Result<Flow, DispatchError> {
        let restrictions: Value = parse_json("restrictedCommands", body)?;
        self.view.notify(Notification::Restrictions(restrictions));
        Ok(Flow::Consumed)
    }

    pub(super) fn on_block_ui(&mut self, reason: &str) -> Flow {
        let message = match reason {
            "rename" => Some(strings::BLOCK_RENAME.to_owned()),
            "switchingtooffline" => Some(strings::BLOCK_OFFLINE.to_owned()),
            _ => None,
        };
        info!("ui blocked: reason={reason}");
        self.session.ui_blocked = true;
        self.view.notify(Notification::BlockUi { message });
        Flow::Consumed
    }

    pub(super) fn on_unblock_ui(&mut self) -> Flow {
        info!("ui unblocked");
        self.session.ui_blocked = false;
        self.view.notify(Notification::UnblockUi);
        Flow::Consumed
    }

    pub(super) fn on_reload(&mut self) -> Flow {
        info!("server requested a reload");
        self.view.notify(Notification::ReloadPage);
        Flow::Consumed
    }

    /// The document is loaded (or reloaded after a reconnect).
    ///
    /// The status goes to the document layer first, then every message
    /// held back while the document was loading, in arrival order.
    pub(super) fn on_status(
        &mut self,
        body: &str,
        text: &str,
        frame: &InboundFrame,
    ) -> Result<Flow, DispatchError> {
        if body.trim_start().starts_with('{') {
            parse_json::<Value>("status", body)?;
        }
        let reconnected = self.session.loaded_once && self.session.reconnecting;
        if reconnected {
            info!("document reloaded after reconnect");
            self.view.notify(Notification::Reconnected);
            self.session.migrating = false;
        }
        if reconnected || !self.session.loaded_once {
            self.view.set_permission(self.session.permission());
        }
        self.session.loaded_once = true;
        self.session.document_ready = true;
        self.recovery.document_ready();
        self.view.notify(Notification::HideBusy);
        self.view.notify(Notification::DocumentLoaded(true));
        self.view.deliver(DocumentMessage {
            text,
            payload: frame.payload(),
            image: frame.image(),
        });
        self.session.reconnecting = false;
        self.replay_delayed();
        Ok(Flow::Consumed)
    }

    fn replay_delayed(&mut self) {
        if self.delayed.is_empty() {
            return;
        }
        debug!("replaying delayed messages: count={}", self.delayed.len());
        while let Some(delayed) = self.delayed.pop_front() {
            let view = &mut self.view;
            let delivered = catch_unwind(AssertUnwindSafe(|| {
                view.deliver(DocumentMessage {
                    text: &delayed.text,
                    payload: delayed.frame.payload(),
                    image: delayed.frame.image(),
                });
            }));
            if let Err(panic) = delivered {
                error!(
                    "delayed message failed: error={}, frame={}",
                    format_panic(panic),
                    loggable(&delayed.text, self.config.log_frame_limit)
                );
            }
        }
    }

    pub(super) fn on_progress(&mut self, body: &str) -> Result<Flow, DispatchError> {
        let mut info: Value = parse_json("progress", body)?;
        let id = info
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(DispatchError::MissingField {
                kind: "progress",
                field: "id",
            })?;
        let background = info.get("type").and_then(Value::as_str) == Some("bg");
        if let Some(fields) = info.as_object_mut() {
            fields.insert("statusType".to_owned(), Value::from(id.as_str()));
            fields.insert("background".to_owned(), Value::from(background));
        }
        match id.as_str() {
            "find" | "connect" | "ready" => {
                self.view.notify(Notification::Busy {
                    message: strings::CONNECTING.to_owned(),
                });
                if id == "ready" {
                    self.recovery.document_ready();
                }
            }
            "start" | "setvalue" => self.view.notify(Notification::StatusIndicator(info)),
            "finish" => {
                self.view.notify(Notification::StatusIndicator(info));
                if self.session.server_recycling {
                    self.view.notify(Notification::Busy {
                        message: strings::SERVER_SHUTTING_DOWN.to_owned(),
                    });
                }
            }
            other => warn!("unknown progress status: id={other}"),
        }
        Ok(Flow::Consumed)
    }

    pub(super) fn on_document(&mut self, text: &str) -> Flow {
        if text.starts_with("downloadas:") {
            self.view.notify(Notification::post(
                "Action_Save_Resp",
                json!({"success": true, "result": "exportas", "errorMsg": ""}),
            ));
        }
        Flow::Forward
    }
}
