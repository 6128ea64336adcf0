//! Save-as, rename and export results.

use log::{debug, info};
use serde_json::json;
use url::Url;

use super::Flow;
use crate::{
    actor::SessionActor,
    command::ServerCommand,
    session::Permission,
    strings,
    view::{Notification, View},
};

/// Storage parameters carried in the query of a save-as URL.
#[derive(Debug, Default, PartialEq, Eq)]
struct StorageParams {
    access_token: Option<String>,
    access_token_ttl: Option<u64>,
    no_auth_header: Option<String>,
}

impl StorageParams {
    fn from_url(url: &str) -> Self {
        let Ok(url) = Url::parse(url) else {
            return Self::default();
        };
        let mut params = Self::default();
        let mut ttl = None;
        let mut no_auth_header = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "access_token" => params.access_token = Some(value.into_owned()),
                "access_token_ttl" => ttl = Some(value.into_owned()),
                "no_auth_header" => no_auth_header = Some(value.into_owned()),
                _ => {}
            }
        }
        if params.access_token.is_some() {
            params.access_token_ttl = ttl.and_then(|t| t.parse().ok()).filter(|&t| t > 0);
            params.no_auth_header = no_auth_header.filter(|v| v == "1" || v == "true");
        }
        params
    }
}

impl<V: View> SessionActor<V> {
    pub(super) fn on_saved_as(&mut self, text: &str) -> Flow {
        let command = ServerCommand::parse(text);
        if text.starts_with("renamefile:") {
            self.view.notify(Notification::HideBusy);
            if self.switch_document(&command).is_some() {
                let name = command
                    .decoded_filename()
                    .map(|name| name.into_owned())
                    .unwrap_or_default();
                info!("document renamed: name={name}");
                self.view
                    .notify(Notification::post("File_Rename", json!({"NewName": name})));
            }
        } else {
            self.join_saved_as(&command);
        }
        Flow::Forward
    }

    /// Reopen the session on the document a save-as produced.
    pub(crate) fn join_saved_as(&mut self, command: &ServerCommand) {
        self.view.notify(Notification::HideBusy);
        let Some(url) = self.switch_document(command) else {
            return;
        };
        let params = StorageParams::from_url(&url);
        debug!(
            "save-as storage parameters: token={}, ttl={:?}",
            params.access_token.is_some(),
            params.access_token_ttl
        );
        let document = self.session.document_mut();
        document.access_token = params.access_token;
        document.access_token_ttl = params.access_token_ttl;
        document.no_auth_header = params.no_auth_header;

        // The copy is ours to edit even if the original was not.
        self.session.reset_permission(Permission::Edit);
        self.connect(None);
        let name = command
            .decoded_filename()
            .map(|name| name.into_owned())
            .unwrap_or_default();
        info!("joined saved document: name={name}");
        self.view.notify(Notification::post(
            "Action_Save_Resp",
            json!({"success": true, "fileName": name}),
        ));
    }

    /// Point the session at the URL of `command`, keeping the previous
    /// WOPI source so the next server greeting is not taken as a restart.
    ///
    /// Returns the full URL, query included.
    fn switch_document(&mut self, command: &ServerCommand) -> Option<String> {
        let url = command.url.clone().filter(|url| !url.is_empty())?;
        let doc_url = url.split('?').next().unwrap_or_default().to_owned();
        let document = self.session.document_mut();
        document.previous_wopi_src = Some(std::mem::replace(&mut document.wopi_src, doc_url.clone()));
        document.url = doc_url;
        Some(url)
    }

    pub(super) fn on_exported(&mut self, text: &str) -> Flow {
        let command = ServerCommand::parse(text);
        self.view.notify(Notification::HideBusy);
        let name = command
            .decoded_filename()
            .map(|name| name.into_owned())
            .unwrap_or_default();
        info!("document exported: name={name}");
        self.view.notify(Notification::Modal {
            id: "exported-success".to_owned(),
            title: strings::EXPORTED_TITLE.to_owned(),
            message: format!("{}{name}", strings::EXPORTED),
        });
        self.view.notify(Notification::post(
            "Action_Save_Resp",
            json!({"success": true, "result": "exportas", "errorMsg": ""}),
        ));
        Flow::Forward
    }
}
