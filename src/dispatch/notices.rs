//! `error:`, `info:`, `warn:` and `blockedcommand:` notices.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use log::{debug, info, warn};
use serde_json::json;
use tokio::time::Instant;
use url::Url;

use super::Flow;
use crate::{
    actor::{Prompt, SessionActor},
    command::ServerCommand,
    recovery::UnloadingRetry,
    session::Session,
    strings,
    view::{Notification, PasswordKind, View},
};

/// Text shown when the storage host rejected the server.
///
/// The certificate verification detail travels base64-encoded in `code=`.
pub(crate) fn unauthorized_message(command: &ServerCommand) -> String {
    let mut message = strings::UNAUTHORIZED.to_owned();
    if let Some(code) = command.error_code.as_deref().filter(|c| !c.is_empty()) {
        let detail = STANDARD
            .decode(code)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_else(|_| code.to_owned());
        message.push(' ');
        message.push_str(&strings::VERIFICATION_ERROR.replace("{errormessage}", &detail));
    }
    message
}

/// `template` with `%storageserver` replaced by the document URL's host.
pub(crate) fn with_storage_host(template: &str, session: &Session) -> String {
    let host = Url::parse(&session.document().url)
        .ok()
        .and_then(|url| {
            url.host_str().map(|host| match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_owned(),
            })
        })
        .unwrap_or_default();
    template.replace("%storageserver", &host)
}

fn storage_error(kind: &str) -> Option<&'static str> {
    match kind {
        "savediskfull" => Some(strings::STORAGE_SAVE_DISK_FULL),
        "savetoolarge" => Some(strings::STORAGE_SAVE_TOO_LARGE),
        "savefailed" => Some(strings::STORAGE_SAVE_FAILED),
        "renamefailed" => Some(strings::STORAGE_RENAME_FAILED),
        "saveunauthorized" => Some(strings::STORAGE_SAVE_UNAUTHORIZED),
        "saveasfailed" => Some(strings::STORAGE_SAVE_AS_FAILED),
        "loadfailed" => Some(strings::STORAGE_LOAD_FAILED),
        _ => None,
    }
}

impl<V: View> SessionActor<V> {
    pub(super) fn on_error(&mut self, text: &str) -> Flow {
        let command = ServerCommand::parse(text);
        warn!("server error: cmd={}, kind={}", command.cmd(), command.kind());
        match command.cmd() {
            "storage" | "saveas" | "downloadas" | "exportas" => self.on_storage_error(&command),
            "internal" => self.on_internal_error(&command),
            "load" => self.on_load_error(&command),
            "dialogevent" if command.kind() == "cantchangepass" => {
                self.view.notify(Notification::Modal {
                    id: "cool_alert".to_owned(),
                    title: String::new(),
                    message: strings::CANT_CHANGE_PASSWORD.to_owned(),
                });
                Flow::Consumed
            }
            _ if !self.session.loaded_once => {
                let message = match command.kind() {
                    "hardlimitreached" => {
                        let param = |i: usize| command.params.get(i).map_or("", String::as_str);
                        strings::LIMIT_REACHED_PROD
                            .replace("{0}", param(0))
                            .replace("{1}", param(1))
                    }
                    "serviceunavailable" => strings::SERVICE_UNAVAILABLE.to_owned(),
                    _ => text.strip_prefix("error:").unwrap_or(text).trim().to_owned(),
                };
                self.fail(message);
                Flow::Halt
            }
            _ => Flow::Forward,
        }
    }

    fn on_storage_error(&mut self, command: &ServerCommand) -> Flow {
        if command.cmd() != "storage" {
            self.view.notify(Notification::post(
                "Action_Save_Resp",
                json!({"success": false, "result": command.kind()}),
            ));
        }
        self.view.notify(Notification::HideBusy);

        if command.kind() == "documentconflict" {
            if self.view.current_permission().is_read_only() {
                debug!("document conflict ignored: view is read-only");
                return Flow::Consumed;
            }
            self.prompt = Some(Prompt::Conflict);
            self.paused = true;
            self.view.notify(Notification::DocumentConflict {
                save_to_new_file: !self.session.user_can_not_write_relative,
            });
            return Flow::Halt;
        }
        let load_failed = command.kind() == "loadfailed";
        if load_failed {
            // The server drops the socket next; close first so the load
            // failure is what the user sees.
            self.close_connection(None, None);
        }
        let Some(template) = storage_error(command.kind()) else {
            return Flow::Forward;
        };
        let message = with_storage_host(template, &self.session);
        self.view.notify(Notification::Warn {
            message: message.clone(),
        });
        self.view.notify(Notification::post(
            "Action_Save_Resp",
            json!({
                "success": false,
                "cmd": command.cmd(),
                "result": command.kind(),
                "errorMsg": message,
            }),
        ));
        if load_failed { Flow::Halt } else { Flow::Consumed }
    }

    fn on_internal_error(&mut self, command: &ServerCommand) -> Flow {
        self.view.notify(Notification::HideBusy);
        let message = match command.kind() {
            "diskfull" => strings::DISK_FULL.to_owned(),
            "unauthorized" => {
                let message = unauthorized_message(command);
                self.view.notify(Notification::post(
                    "Action_Load_Resp",
                    json!({
                        "errorType": "websocketunauthorized",
                        "success": false,
                        "errorMsg": message,
                        "result": "",
                    }),
                ));
                message
            }
            _ => strings::INTERNAL_ERROR.to_owned(),
        };
        self.fail(message);
        Flow::Halt
    }

    fn on_load_error(&mut self, command: &ServerCommand) -> Flow {
        self.view.notify(Notification::HideBusy);
        self.close_connection(None, None);

        let kind = command.kind();
        let password = if let Some(needed) = kind.strip_prefix("passwordrequired") {
            match needed.trim_start_matches(':') {
                "to-modify" => Some((PasswordKind::ToModify, strings::PASSWORD_TO_MODIFY)),
                _ => Some((PasswordKind::ToView, strings::PASSWORD_TO_VIEW)),
            }
        } else if kind.starts_with("wrongpassword") {
            Some((PasswordKind::Retry, strings::WRONG_PASSWORD))
        } else {
            None
        };
        if let Some((kind, message)) = password {
            info!("document password requested: kind={kind:?}");
            self.prompt = Some(Prompt::Password(kind));
            self.recovery.await_password();
            self.view.notify(Notification::PasswordPrompt {
                kind,
                message: message.to_owned(),
            });
            return Flow::Halt;
        }

        if kind.starts_with("faileddocloading") {
            self.fail(strings::FAILED_DOC_LOADING);
            return Flow::Halt;
        }
        if kind.starts_with("docloadtimeout") {
            self.fail(strings::DOC_LOAD_TIMEOUT);
            return Flow::Halt;
        }
        if kind.starts_with("docunloading") {
            self.session.active = false;
            return match self.recovery.unloading_retry(Instant::now()) {
                UnloadingRetry::GaveUp => {
                    warn!("document unloading: giving up");
                    self.view.notify(Notification::Error {
                        message: strings::DOC_UNLOADING_GIVE_UP.to_owned(),
                    });
                    Flow::Halt
                }
                UnloadingRetry::Scheduled {
                    attempt,
                    delay,
                    first,
                } => {
                    info!("document unloading: attempt={attempt}, delay={delay:?}");
                    if first {
                        self.view.notify(Notification::Busy {
                            message: strings::DOC_UNLOADING_RETRY.to_owned(),
                        });
                    }
                    Flow::Consumed
                }
            };
        }
        Flow::Forward
    }

    pub(super) fn on_info(&mut self, text: &str) -> Flow {
        let command = ServerCommand::parse(text);
        if command.cmd() == "socket" && command.kind() == "limitreached" && !self.session.limit_notice_shown {
            self.session.limit_notice_shown = true;
            let param = |i: usize| command.params.get(i).map_or("", String::as_str);
            let message = strings::branded(strings::LIMIT_REACHED)
                .replace("{docs}", param(0))
                .replace("{connections}", param(1));
            self.view.notify(Notification::Infobar {
                message,
                link: strings::PRODUCT_URL.to_owned(),
            });
        }
        Flow::Forward
    }

    pub(super) fn on_warn(&mut self, rest: &str) -> Flow {
        let Some(saved) = rest.strip_prefix("saveas:") else {
            return Flow::Forward;
        };
        let command = ServerCommand::parse(saved);
        let username = command
            .decoded_username()
            .map_or_else(|| strings::SOMEONE.to_owned(), |name| name.into_owned());
        let filename = command
            .decoded_filename()
            .map(|name| name.into_owned())
            .unwrap_or_default();
        info!("document saved under a new name by another user: filename={filename}");
        self.view.notify(Notification::SaveAsJoin { username, filename });
        self.prompt = Some(Prompt::SaveAs(command));
        self.paused = true;
        Flow::Halt
    }

    pub(super) fn on_blocked_command(&mut self, rest: &str) -> Flow {
        let command = ServerCommand::parse(rest);
        match command.kind() {
            "locked" => self.view.notify(Notification::UnlockPrompt {
                command: command.cmd().to_owned(),
            }),
            "restricted" => info!("restricted command blocked: cmd={}", command.cmd()),
            other => debug!("command blocked: cmd={}, kind={other}", command.cmd()),
        }
        Flow::Consumed
    }
}
