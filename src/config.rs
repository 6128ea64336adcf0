//! Session configuration.
//!
//! [`SessionConfig`] carries everything the engine needs before the first
//! socket is opened: where the server lives, which document to load, the
//! client parameters echoed in the load request, and the timing knobs for
//! the emission queue and the recovery machinery. It deserializes from JSON
//! with every field optional, so hosts can supply only what they override.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::{
    recovery::RecoveryConfig,
    session::Permission,
    slurp::SlurpConfig,
};

/// Frames longer than this many characters are truncated in logs.
pub const DEFAULT_LOG_FRAME_LIMIT: usize = 256;

/// Errors raised while validating a [`SessionConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The server URL could not be parsed.
    #[error("invalid server url: {0}")]
    InvalidServerUrl(#[from] url::ParseError),
    /// The server URL does not use a WebSocket scheme.
    #[error("unsupported scheme {0:?}; expected ws, wss, http or https")]
    UnsupportedScheme(String),
    /// No document identifier was configured.
    #[error("no document configured")]
    MissingDocument,
    /// The JSON configuration could not be decoded.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Region of the document the client expects to display first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VisibleArea {
    /// Left edge in document units.
    pub x: i64,
    /// Top edge in document units.
    pub y: i64,
    /// Width in document units.
    pub width: i64,
    /// Height in document units.
    pub height: i64,
}

impl std::fmt::Display for VisibleArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{};{};{};{}", self.x, self.y, self.width, self.height)
    }
}

/// Identity of the document and the credentials used to fetch it.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Document URL announced in the load request.
    pub url: String,
    /// WOPI source of the document; defaults to `url` when empty.
    pub wopi_src: String,
    /// Access token forwarded to the storage backend.
    pub access_token: Option<String>,
    /// Expiry of `access_token` in milliseconds since the Unix epoch.
    pub access_token_ttl: Option<u64>,
    /// Ask the server not to send an `Authorization` header to storage.
    pub no_auth_header: Option<String>,
    /// Document password, when known up front.
    pub password: Option<String>,
    /// Permission requested when the document is opened.
    pub permission: Permission,
    /// Version timestamp to open instead of the latest revision.
    pub timestamp: Option<String>,
}

/// Configuration for one document session.
///
/// ```
/// use docwire::SessionConfig;
///
/// let cfg = SessionConfig::from_json(
///     r#"{"server_url": "wss://office.example", "document": {"url": "file:///a.odt"}}"#,
/// )
/// .unwrap();
/// assert_eq!(cfg.locale, "en-US");
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL of the document server.
    pub server_url: String,
    /// Document to open.
    pub document: DocumentConfig,
    /// Locale announced to the server.
    pub locale: String,
    /// IANA time zone of the client.
    pub timezone: Option<String>,
    /// Device form factor hint (`desktop`, `tablet`, `mobile`).
    pub device_form_factor: Option<String>,
    /// Rendering options forwarded verbatim inside the load request.
    pub rendering_options: Option<serde_json::Value>,
    /// Whether online spell checking is enabled.
    pub spell_online: Option<bool>,
    /// Whether the client UI uses a dark theme.
    pub dark_theme: Option<bool>,
    /// Whether the document canvas uses a dark background.
    pub dark_background: Option<bool>,
    /// Whether accessibility support is enabled.
    pub accessibility: Option<bool>,
    /// Area the client will display first.
    pub visible_area: VisibleArea,
    /// The server sits behind a routing proxy (cluster mode).
    pub indirect: bool,
    /// Route token for an indirect deployment.
    pub route_token: Option<String>,
    /// Server the routing proxy is expected to pin us to.
    pub expected_server_id: Option<String>,
    /// Surface per-frame failures to the host as modals.
    pub debug: bool,
    /// Suppress "server disconnected" style messages and post them instead.
    pub disable_inactive_messages: bool,
    /// Maximum characters of a frame written to the log.
    pub log_frame_limit: usize,
    /// Emission queue timing.
    pub slurp: SlurpConfig,
    /// Reconnect and reload timing.
    pub recovery: RecoveryConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            document: DocumentConfig::default(),
            locale: "en-US".to_owned(),
            timezone: None,
            device_form_factor: None,
            rendering_options: None,
            spell_online: None,
            dark_theme: None,
            dark_background: None,
            accessibility: None,
            visible_area: VisibleArea::default(),
            indirect: false,
            route_token: None,
            expected_server_id: None,
            debug: false,
            disable_inactive_messages: false,
            log_frame_limit: DEFAULT_LOG_FRAME_LIMIT,
            slurp: SlurpConfig::default(),
            recovery: RecoveryConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create a configuration for `document_url` served by `server_url`.
    #[must_use]
    pub fn new(server_url: impl Into<String>, document_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            document: DocumentConfig {
                url: document_url.into(),
                ..DocumentConfig::default()
            },
            ..Self::default()
        }
    }

    /// Decode a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] if the input is not valid.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(input)?;
        Ok(cfg.normalized())
    }

    /// Set the initial permission.
    #[must_use]
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.document.permission = permission;
        self
    }

    /// Set the locale.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Set the access token and its expiry in epoch milliseconds.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>, ttl: Option<u64>) -> Self {
        self.document.access_token = Some(token.into());
        self.document.access_token_ttl = ttl;
        self
    }

    /// Enable cluster routing with the given expectations.
    #[must_use]
    pub fn with_routing(mut self, route_token: Option<String>, server_id: Option<String>) -> Self {
        self.indirect = true;
        self.route_token = route_token;
        self.expected_server_id = server_id;
        self
    }

    /// Enable debug surfacing of handler failures.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Replace the emission queue timing.
    #[must_use]
    pub fn with_slurp(mut self, slurp: SlurpConfig) -> Self {
        self.slurp = slurp;
        self
    }

    /// Replace the recovery timing.
    #[must_use]
    pub fn with_recovery(mut self, recovery: RecoveryConfig) -> Self {
        self.recovery = recovery;
        self
    }

    /// Clamp nested timing values and fill derived defaults.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.slurp = self.slurp.normalized();
        self.recovery = self.recovery.normalized();
        if self.document.wopi_src.is_empty() {
            self.document.wopi_src.clone_from(&self.document.url);
        }
        if self.log_frame_limit == 0 {
            self.log_frame_limit = DEFAULT_LOG_FRAME_LIMIT;
        }
        self
    }

    /// Check that the server URL and document are usable.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first problem found.
    pub fn validate(&self) -> Result<Url, ConfigError> {
        if self.document.url.is_empty() {
            return Err(ConfigError::MissingDocument);
        }
        let url = Url::parse(&self.server_url)?;
        match url.scheme() {
            "ws" | "wss" | "http" | "https" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme(other.to_owned())),
        }
    }
}

/// Serde adapter reading a [`Duration`] from integer milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Duration helper shared by the nested timing configs.
pub(crate) const fn ms(value: u64) -> Duration { Duration::from_millis(value) }

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn json_overrides_merge_with_defaults() {
        let cfg = SessionConfig::from_json(
            r#"{
                "server_url": "https://office.example:9980",
                "document": {"url": "https://wopi.example/files/1", "permission": "view"},
                "slurp": {"max_delay": 20},
                "recovery": {"unloading_max_attempts": 4}
            }"#,
        )
        .expect("valid config");
        assert_eq!(cfg.document.permission, Permission::View);
        assert_eq!(cfg.document.wopi_src, "https://wopi.example/files/1");
        assert_eq!(cfg.slurp.max_delay, Duration::from_millis(20));
        assert_eq!(cfg.recovery.unloading_max_attempts, 4);
        assert_eq!(cfg.log_frame_limit, DEFAULT_LOG_FRAME_LIMIT);
    }

    #[rstest]
    #[case("ftp://office.example")]
    #[case("file:///tmp/x")]
    fn rejects_non_socket_schemes(#[case] server: &str) {
        let cfg = SessionConfig::new(server, "doc");
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn missing_document_is_reported() {
        let cfg = SessionConfig::new("wss://office.example", "");
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingDocument)));
    }

    #[test]
    fn visible_area_uses_semicolons() {
        let area = VisibleArea {
            x: 0,
            y: 10,
            width: 12000,
            height: 8000,
        };
        assert_eq!(area.to_string(), "0;10;12000;8000");
    }
}
