//! Per-document session state.
//!
//! `Session` replaces the ambient flags a browser client would keep on
//! global objects. It is owned by the session actor and only mutated from
//! frame handlers and the recovery machinery, so no locking is involved.

mod identity;
mod permission;

pub use identity::{BackendVersion, ServerIdentity};
pub use permission::{Permission, UnknownPermission};

use crate::config::SessionConfig;

/// Protocol version announced in the `coolclient` greeting and expected
/// in the server's `coolserver` reply.
pub const PROTOCOL_VERSION: &str = "0.1";

/// Where the document lives and how to authenticate against it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentTarget {
    /// Document URL sent in the load request.
    pub url: String,
    /// WOPI source of the current document.
    pub wopi_src: String,
    /// WOPI source before the last save-as/rename, if any.
    pub previous_wopi_src: Option<String>,
    /// Storage access token.
    pub access_token: Option<String>,
    /// Access token expiry in epoch milliseconds.
    pub access_token_ttl: Option<u64>,
    /// `no_auth_header` storage parameter.
    pub no_auth_header: Option<String>,
    /// Password supplied by the user.
    pub password: Option<String>,
    /// Route token for indirect deployments.
    pub route_token: Option<String>,
    /// Server the routing proxy should pin this session to.
    pub expected_server_id: Option<String>,
}

impl DocumentTarget {
    /// Whether the document is unchanged since the last connection.
    #[must_use]
    pub fn is_same_file(&self) -> bool {
        self.previous_wopi_src
            .as_deref()
            .is_none_or(|previous| previous == self.wopi_src)
    }
}

/// Mutable state of one document session.
#[derive(Debug)]
pub struct Session {
    server: Option<ServerIdentity>,
    backend: Option<BackendVersion>,
    os_info: Option<String>,
    permission: Permission,
    document: DocumentTarget,
    pub(crate) active: bool,
    pub(crate) document_ready: bool,
    pub(crate) loaded_once: bool,
    pub(crate) reconnecting: bool,
    pub(crate) migrating: bool,
    pub(crate) document_idle: bool,
    pub(crate) server_recycling: bool,
    pub(crate) ui_blocked: bool,
    pub(crate) limit_notice_shown: bool,
    pub(crate) trace_event_logging: bool,
    pub(crate) user_can_not_write_relative: bool,
}

impl Session {
    /// Create the state for a freshly opened view.
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        let doc = &config.document;
        Self {
            server: None,
            backend: None,
            os_info: None,
            permission: doc.permission,
            document: DocumentTarget {
                url: doc.url.clone(),
                wopi_src: if doc.wopi_src.is_empty() {
                    doc.url.clone()
                } else {
                    doc.wopi_src.clone()
                },
                previous_wopi_src: None,
                access_token: doc.access_token.clone(),
                access_token_ttl: doc.access_token_ttl,
                no_auth_header: doc.no_auth_header.clone(),
                password: doc.password.clone(),
                route_token: config.route_token.clone(),
                expected_server_id: config.expected_server_id.clone(),
            },
            active: true,
            document_ready: false,
            loaded_once: false,
            reconnecting: false,
            migrating: false,
            document_idle: false,
            server_recycling: false,
            ui_blocked: false,
            limit_notice_shown: false,
            trace_event_logging: false,
            user_can_not_write_relative: true,
        }
    }

    /// Identity of the server we last spoke to.
    #[must_use]
    pub fn server(&self) -> Option<&ServerIdentity> { self.server.as_ref() }

    /// Record a new server identity, returning the previous one.
    pub fn replace_server(&mut self, identity: ServerIdentity) -> Option<ServerIdentity> {
        self.server.replace(identity)
    }

    /// Backend version details, once announced.
    #[must_use]
    pub fn backend(&self) -> Option<&BackendVersion> { self.backend.as_ref() }

    pub(crate) fn set_backend(&mut self, backend: BackendVersion) { self.backend = Some(backend); }

    /// Operating system string reported by the server.
    #[must_use]
    pub fn os_info(&self) -> Option<&str> { self.os_info.as_deref() }

    pub(crate) fn set_os_info(&mut self, info: &str) { self.os_info = Some(info.to_owned()); }

    /// Effective permission level.
    #[must_use]
    pub fn permission(&self) -> Permission { self.permission }

    /// Narrow the effective permission, returning the resulting level.
    pub fn narrow_permission(&mut self, requested: Permission) -> Permission {
        self.permission = self.permission.narrow(requested);
        self.permission
    }

    /// Reset the permission for a different document (save-as).
    pub(crate) fn reset_permission(&mut self, permission: Permission) {
        self.permission = permission;
    }

    /// Current document target.
    #[must_use]
    pub fn document(&self) -> &DocumentTarget { &self.document }

    pub(crate) fn document_mut(&mut self) -> &mut DocumentTarget { &mut self.document }

    /// Whether the session accepts regular outbound traffic.
    #[must_use]
    pub fn is_active(&self) -> bool { self.active }

    /// Whether the first `status:` has been processed.
    #[must_use]
    pub fn is_document_ready(&self) -> bool { self.document_ready }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wopi_src_defaults_to_document_url() {
        let cfg = SessionConfig::new("wss://office.example", "https://wopi.example/files/7");
        let session = Session::new(&cfg);
        assert_eq!(session.document().wopi_src, "https://wopi.example/files/7");
        assert!(session.document().is_same_file());
    }

    #[test]
    fn rename_marks_a_different_file() {
        let cfg = SessionConfig::new("wss://office.example", "https://wopi.example/files/7");
        let mut session = Session::new(&cfg);
        let doc = session.document_mut();
        doc.previous_wopi_src = Some(doc.wopi_src.clone());
        doc.wopi_src = "https://wopi.example/files/8".to_owned();
        assert!(!session.document().is_same_file());
    }

    #[test]
    fn permission_starts_from_config_and_only_narrows() {
        let cfg = SessionConfig::new("wss://office.example", "doc").with_permission(Permission::View);
        let mut session = Session::new(&cfg);
        assert_eq!(session.narrow_permission(Permission::Edit), Permission::View);
        assert_eq!(session.narrow_permission(Permission::ReadOnly), Permission::ReadOnly);
        assert_eq!(session.narrow_permission(Permission::Edit), Permission::ReadOnly);
    }
}
