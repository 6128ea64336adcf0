//! Key/value parameters embedded in server messages.
//!
//! Several messages (`error:`, `warn:`, `saveas:`, `info:`...) carry
//! whitespace-separated `key=value` tokens after their prefix. This module
//! extracts the keys the engine acts on.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// Parsed parameters of one server message.
///
/// ```
/// use docwire::ServerCommand;
///
/// let cmd = ServerCommand::parse("error: cmd=load kind=passwordrequired:to-view");
/// assert_eq!(cmd.error_cmd.as_deref(), Some("load"));
/// assert_eq!(cmd.error_kind.as_deref(), Some("passwordrequired:to-view"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerCommand {
    /// `cmd=`: the command the error relates to.
    pub error_cmd: Option<String>,
    /// `kind=`: the error or notice kind.
    pub error_kind: Option<String>,
    /// `code=`: optional detail code.
    pub error_code: Option<String>,
    /// `params=`: comma-separated parameters.
    pub params: Vec<String>,
    /// `username=`: percent-encoded user name.
    pub username: Option<String>,
    /// `filename=`: percent-encoded file name.
    pub filename: Option<String>,
    /// `url=`: new document URL for save-as/rename.
    pub url: Option<String>,
    /// `type=`: document type.
    pub doc_type: Option<String>,
    /// `viewid=`: originating view.
    pub view_id: Option<String>,
    /// `rendercount=`: render counter echoed in pong messages.
    pub render_count: Option<u32>,
}

impl ServerCommand {
    /// Parse every recognised `key=value` token in `message`.
    #[must_use]
    pub fn parse(message: &str) -> Self {
        let mut command = Self::default();
        for token in message.split([' ', '\n']).filter(|t| !t.is_empty()) {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            let value = value.to_owned();
            match key {
                "cmd" => command.error_cmd = Some(value),
                "kind" => command.error_kind = Some(value),
                "code" => command.error_code = Some(value),
                "params" => command.params = value.split(',').map(str::to_owned).collect(),
                "username" => command.username = Some(value),
                "filename" => command.filename = Some(value),
                "url" => command.url = Some(value),
                "type" => command.doc_type = Some(value),
                "viewid" => command.view_id = Some(value),
                "rendercount" => command.render_count = value.parse().ok(),
                _ => {}
            }
        }
        command
    }

    /// `cmd=` value or the empty string.
    #[must_use]
    pub fn cmd(&self) -> &str { self.error_cmd.as_deref().unwrap_or_default() }

    /// `kind=` value or the empty string.
    #[must_use]
    pub fn kind(&self) -> &str { self.error_kind.as_deref().unwrap_or_default() }

    /// Decoded file name.
    #[must_use]
    pub fn decoded_filename(&self) -> Option<Cow<'_, str>> {
        self.filename.as_deref().map(decode_component)
    }

    /// Decoded user name.
    #[must_use]
    pub fn decoded_username(&self) -> Option<Cow<'_, str>> {
        self.username.as_deref().map(decode_component)
    }
}

fn decode_component(value: &str) -> Cow<'_, str> { percent_decode_str(value).decode_utf8_lossy() }

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn splits_on_spaces_and_newlines() {
        let cmd = ServerCommand::parse("info: cmd=socket kind=limitreached\nparams=20,10");
        assert_eq!(cmd.cmd(), "socket");
        assert_eq!(cmd.kind(), "limitreached");
        assert_eq!(cmd.params, vec!["20", "10"]);
    }

    #[test]
    fn decodes_percent_encoded_names() {
        let cmd = ServerCommand::parse("warn: saveas: username=Ana%20Lee filename=Q3%20plan.odt");
        assert_eq!(cmd.decoded_username().as_deref(), Some("Ana Lee"));
        assert_eq!(cmd.decoded_filename().as_deref(), Some("Q3 plan.odt"));
    }

    #[rstest]
    #[case("pong rendercount=12", Some(12))]
    #[case("pong rendercount=x", None)]
    #[case("pong", None)]
    fn reads_render_count(#[case] message: &str, #[case] expected: Option<u32>) {
        assert_eq!(ServerCommand::parse(message).render_count, expected);
    }

    #[test]
    fn keeps_values_containing_equals() {
        let cmd = ServerCommand::parse("saveas: url=https://wopi.example/f?access_token=abc filename=x");
        assert_eq!(
            cmd.url.as_deref(),
            Some("https://wopi.example/f?access_token=abc")
        );
    }

    #[test]
    fn missing_keys_default_to_empty() {
        let cmd = ServerCommand::parse("error:");
        assert_eq!(cmd, ServerCommand::default());
        assert_eq!(cmd.cmd(), "");
    }
}
