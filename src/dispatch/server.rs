//! Server identity, routing and migration.

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;

use super::{DispatchError, Flow, parse_json};
use crate::{
    actor::SessionActor,
    recovery::{RetryAction, WrongServer},
    session::{BackendVersion, PROTOCOL_VERSION, Permission, ServerIdentity},
    strings,
    transport::ReadyState,
    view::{Notification, SnackbarAction, View},
};

/// Body of a `migrate:` message.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MigrateInfo {
    after_save: bool,
    saved: bool,
    route_token: Option<String>,
    server_id: Option<String>,
}

impl<V: View> SessionActor<V> {
    pub(super) fn on_coolserver(&mut self, body: &str) -> Result<Flow, DispatchError> {
        let identity: ServerIdentity = parse_json("coolserver", body)?;
        let changed = self.session.server().is_some_and(|previous| {
            previous.is_known() && identity.differs_from(previous)
        });
        if changed && self.session.document().is_same_file() {
            info!(
                "server changed under the same document: id={}, version={}",
                identity.id, identity.version
            );
            if self.config.disable_inactive_messages {
                self.view
                    .notify(Notification::post("Reloading", json!({"Reason": "Reconnected"})));
            } else {
                self.view.notify(Notification::Snackbar {
                    message: strings::SERVER_REACHABLE.to_owned(),
                    action: Some(SnackbarAction::Reload),
                });
            }
            let delay = self.recovery.config().page_reload_delay;
            self.recovery
                .schedule_reload(delay, RetryAction::ReloadPage, Instant::now());
        }
        let protocol = identity.protocol.clone();
        let server_id = identity.id.clone();
        self.session.replace_server(identity);

        if self.config.indirect {
            let expected = self.session.document().expected_server_id.clone();
            match expected {
                Some(expected) if !expected.is_empty() && expected != server_id => {
                    return Ok(self.wrong_server(&expected, &server_id));
                }
                _ => self.recovery.server_confirmed(),
            }
        }

        if protocol != PROTOCOL_VERSION {
            warn!("protocol mismatch: server={protocol}, client={PROTOCOL_VERSION}");
            self.fail(strings::UNSUPPORTED_SERVER);
            return Ok(Flow::Halt);
        }
        Ok(Flow::Forward)
    }

    /// The routing proxy pinned us to the wrong node.
    fn wrong_server(&mut self, expected: &str, actual: &str) -> Flow {
        match self.recovery.wrong_server() {
            WrongServer::Retry { attempt } => {
                warn!("wrong server: expected={expected}, actual={actual}, attempt={attempt}");
                self.view.notify(Notification::Busy {
                    message: strings::WRONG_SERVER.to_owned(),
                });
                if self.ready_state() == Some(ReadyState::Open) {
                    self.write("routetokensanitycheck");
                }
                let delay = self.recovery.config().wrong_server_reconnect_delay;
                self.reroute(delay);
                Flow::Consumed
            }
            WrongServer::GiveUp => {
                let route_token = self.session.document().route_token.clone().unwrap_or_default();
                let message = strings::branded(strings::CLUSTER_CONFIGURATION)
                    .replace("{0}", expected)
                    .replace("{1}", &route_token)
                    .replace("{2}", actual);
                self.fail(message);
                Flow::Halt
            }
        }
    }

    pub(super) fn on_lokitversion(&mut self, body: &str) -> Result<Flow, DispatchError> {
        let backend: BackendVersion = parse_json("lokitversion", body)?;
        debug!(
            "backend version: product={}, version={}, image_cache={}",
            backend.product_name, backend.product_version, backend.tunnelled_dialog_image_cache_size
        );
        self.session.set_backend(backend);
        Ok(Flow::Forward)
    }

    pub(super) fn on_clipboard_key(&mut self, key: &str) -> Flow {
        self.view.notify(Notification::ClipboardKey(key.to_owned()));
        Flow::Forward
    }

    pub(super) fn on_migrate(&mut self, body: &str) -> Result<Flow, DispatchError> {
        if !self.config.indirect {
            return Ok(Flow::Forward);
        }
        let migrate: MigrateInfo = parse_json("migrate", body)?;
        self.session.server_recycling = false;
        info!(
            "migration: after_save={}, saved={}, server_id={:?}",
            migrate.after_save, migrate.saved, migrate.server_id
        );
        if !migrate.after_save {
            self.session.migrating = true;
            if self.view.current_permission().can_edit() {
                self.view.set_permission(Permission::View);
                self.view.notify(Notification::snackbar(strings::MIGRATING));
            }
            if migrate.saved {
                self.migrate_to(migrate);
            }
        } else if migrate.saved {
            self.migrate_to(migrate);
        } else {
            self.view.set_permission(self.session.permission());
            self.session.migrating = false;
        }
        Ok(Flow::Consumed)
    }

    fn migrate_to(&mut self, migrate: MigrateInfo) {
        let document = self.session.document_mut();
        document.route_token = migrate.route_token;
        document.expected_server_id = migrate.server_id;
        let delay = self.recovery.config().migration_reconnect_delay;
        self.reroute(delay);
    }

    pub(super) fn on_update_route_token(&mut self, token: &str) -> Flow {
        if self.config.indirect && !token.is_empty() {
            info!("route token updated: token={token}");
            self.session.document_mut().route_token = Some(token.to_owned());
        }
        Flow::Forward
    }
}
