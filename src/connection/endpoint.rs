//! WebSocket endpoint URL.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::{Url, form_urlencoded};

use crate::{
    config::{ConfigError, SessionConfig},
    session::Session,
};

/// Characters escaped like JavaScript's `encodeURIComponent`.
pub const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a URI component.
#[must_use]
pub fn encode_component(value: &str) -> String { utf8_percent_encode(value, URI_COMPONENT).to_string() }

/// Build the socket URL for the session's current document.
///
/// The document URL, its access parameters and the client parameters are
/// packed into one encoded path segment; the WOPI source and route token
/// travel as query parameters for the routing layer.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the server URL is unusable.
pub fn socket_url(config: &SessionConfig, session: &Session) -> Result<Url, ConfigError> {
    let mut base = config.validate()?;
    let scheme = match base.scheme() {
        "https" => Some("wss"),
        "http" => Some("ws"),
        _ => None,
    };
    if let Some(scheme) = scheme {
        base.set_scheme(scheme)
            .map_err(|()| ConfigError::UnsupportedScheme(base.scheme().to_owned()))?;
    }

    let doc = session.document();
    let mut params = form_urlencoded::Serializer::new(String::new());
    if let Some(token) = &doc.access_token {
        params.append_pair("access_token", token);
    }
    if let Some(ttl) = doc.access_token_ttl {
        params.append_pair("access_token_ttl", &ttl.to_string());
    }
    if let Some(no_auth) = &doc.no_auth_header {
        params.append_pair("no_auth_header", no_auth);
    }
    params.append_pair("permission", session.permission().as_str());
    params.append_pair("lang", &config.locale);
    if let Some(tz) = &config.timezone {
        params.append_pair("timezone", tz);
    }
    let document = format!("{}?{}", doc.url, params.finish());

    let prefix = base.path().trim_end_matches('/');
    let path = format!("{prefix}/cool/{}/ws", encode_component(&document));
    let mut query = format!("WOPISrc={}&compat=/ws", encode_component(&doc.wopi_src));
    if let Some(route) = &doc.route_token {
        query.push_str("&RouteToken=");
        query.push_str(&encode_component(route));
    }
    base.set_path(&path);
    base.set_query(Some(&query));
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Permission;

    fn session(cfg: &SessionConfig) -> Session { Session::new(cfg) }

    #[test]
    fn encodes_like_uri_component() {
        assert_eq!(
            encode_component("https://h/x y?a=1&b=(2)"),
            "https%3A%2F%2Fh%2Fx%20y%3Fa%3D1%26b%3D(2)"
        );
    }

    #[test]
    fn https_servers_become_wss() {
        let cfg = SessionConfig::new("https://office.example:9980", "https://wopi.example/files/1")
            .with_permission(Permission::View)
            .with_access_token("tok", Some(1_700_000_000_000));
        let url = socket_url(&cfg, &session(&cfg)).expect("url");
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.port(), Some(9980));
        assert!(url.path().starts_with("/cool/https%3A%2F%2Fwopi.example%2Ffiles%2F1%3F"));
        assert!(url.path().ends_with("/ws"));
        assert!(url.path().contains("access_token%3Dtok"));
        assert!(url.path().contains("permission%3Dview"));
        assert_eq!(
            url.query(),
            Some("WOPISrc=https%3A%2F%2Fwopi.example%2Ffiles%2F1&compat=/ws")
        );
    }

    #[test]
    fn route_token_is_appended() {
        let cfg = SessionConfig::new("wss://office.example/sub/", "doc")
            .with_routing(Some("rt-1".to_owned()), None);
        let url = socket_url(&cfg, &session(&cfg)).expect("url");
        assert!(url.path().starts_with("/sub/cool/"));
        assert!(url.query().is_some_and(|q| q.ends_with("&RouteToken=rt-1")));
    }
}
