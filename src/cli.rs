//! Command line interface for the `docwire` binary.
//!
//! The binary opens one document session against a server and logs what
//! the engine reports, which is handy for poking at a deployment.

use std::path::PathBuf;

use clap::Parser;
use docwire::SessionConfig;

/// Command line arguments for the `docwire` binary.
#[derive(Debug, Parser)]
#[command(
    name = "docwire",
    version,
    about = "Open a collaborative document session and log its events"
)]
pub struct Cli {
    /// Base URL of the document server, e.g. `wss://office.example`.
    pub server: String,
    /// URL (or WOPI source) of the document to open.
    pub document: String,
    /// JSON session configuration; positional arguments override its URLs.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Storage access token.
    #[arg(long)]
    pub access_token: Option<String>,
    /// Access token expiry in epoch milliseconds.
    #[arg(long, requires = "access_token")]
    pub access_token_ttl: Option<u64>,
    /// Locale announced to the server.
    #[arg(long)]
    pub lang: Option<String>,
    /// Message to send once the document has loaded. May be repeated.
    #[arg(short, long = "send")]
    pub send: Vec<String>,
    /// Log full protocol traffic and surface handler failures.
    #[arg(short, long)]
    pub debug: bool,
}

impl Cli {
    /// Lay the arguments over `base`, the configuration read from `--config`.
    ///
    /// Debug stays on if either side enables it.
    #[must_use]
    pub fn apply(&self, base: SessionConfig) -> SessionConfig {
        let mut config = base;
        config.server_url.clone_from(&self.server);
        config.document.url.clone_from(&self.document);
        if let Some(token) = &self.access_token {
            config = config.with_access_token(token.as_str(), self.access_token_ttl);
        }
        if let Some(lang) = &self.lang {
            config = config.with_locale(lang.as_str());
        }
        let debug = self.debug || config.debug;
        config.with_debug(debug)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use docwire::SessionConfig;

    use super::Cli;

    #[test]
    fn parses_positional_urls() {
        let cli = Cli::parse_from(["docwire", "wss://office.example", "https://wopi.example/files/1"]);
        assert_eq!(cli.server, "wss://office.example");
        assert_eq!(cli.document, "https://wopi.example/files/1");
        assert!(cli.send.is_empty());
        assert!(!cli.debug);
    }

    #[test]
    fn collects_repeated_messages() {
        let cli = Cli::parse_from([
            "docwire",
            "wss://o",
            "doc",
            "--send",
            "uno .uno:Save",
            "-s",
            "useractive",
        ]);
        assert_eq!(cli.send, vec!["uno .uno:Save", "useractive"]);
    }

    #[test]
    fn ttl_requires_a_token() {
        assert!(Cli::try_parse_from(["docwire", "wss://o", "doc", "--access-token-ttl", "5"]).is_err());
    }

    #[test]
    fn arguments_override_the_file_configuration() {
        let cli = Cli::parse_from([
            "docwire",
            "wss://office.example",
            "https://wopi.example/files/1",
            "--access-token",
            "tok",
            "--access-token-ttl",
            "1700000000000",
            "--lang",
            "de-DE",
        ]);
        let base = SessionConfig::new("wss://other.example", "https://wopi.example/files/9").with_locale("fr-FR");
        let config = cli.apply(base);
        assert_eq!(config.server_url, "wss://office.example");
        assert_eq!(config.document.url, "https://wopi.example/files/1");
        assert_eq!(config.document.access_token.as_deref(), Some("tok"));
        assert_eq!(config.document.access_token_ttl, Some(1_700_000_000_000));
        assert_eq!(config.locale, "de-DE");
        assert!(!config.debug);
    }

    #[test]
    fn debug_from_either_source_is_kept() {
        let quiet = Cli::parse_from(["docwire", "wss://o", "doc"]);
        assert!(quiet.apply(SessionConfig::default().with_debug(true)).debug);

        let loud = Cli::parse_from(["docwire", "wss://o", "doc", "--debug"]);
        assert!(loud.apply(SessionConfig::default()).debug);
    }
}
