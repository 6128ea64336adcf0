//! Closed set of inbound message kinds.
//!
//! [`Message::parse`] maps the routed text of a frame onto one variant.
//! Anything the engine does not handle itself becomes
//! [`Message::Document`] and is forwarded to the view untouched.

/// Inbound message, borrowing its body from the frame text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Message<'a> {
    /// `coolserver {json}`: server identity.
    CoolServer(&'a str),
    /// `lokitversion {json}`: backend version.
    LokitVersion(&'a str),
    /// `enabletraceeventlogging <token>`.
    EnableTraceEventLogging(&'a str),
    /// `osinfo <text>`.
    OsInfo(&'a str),
    /// `clipboardkey: <key>`.
    ClipboardKey(&'a str),
    /// `perm:<level>`.
    Perm(&'a str),
    /// `filemode:{json}`.
    FileMode(&'a str),
    /// `lockfailed:<reason>`.
    LockFailed(&'a str),
    /// `wopi: {json}`: storage properties.
    Wopi(&'a str),
    /// `loadstorage: <status>`.
    LoadStorage(&'a str),
    /// `lastmodtime: <time>`.
    LastModTime(&'a str),
    /// `commandresult: {json}`.
    CommandResult(&'a str),
    /// `migrate: {json}`.
    Migrate(&'a str),
    /// `close: <reason>`.
    Close(&'a str),
    /// `error: cmd=.. kind=..`.
    Error,
    /// `fontsmissing: {json}`.
    FontsMissing(&'a str),
    /// `info: cmd=.. kind=..`.
    Info,
    /// `saveas: url=.. filename=..`.
    SaveAs,
    /// `renamefile: url=.. filename=..`.
    RenameFile,
    /// `exportas: url=.. filename=..`.
    ExportAs,
    /// `warn: <text>`.
    Warn(&'a str),
    /// `blockui: <reason>`.
    BlockUi(&'a str),
    /// `unblockui:`.
    UnblockUi,
    /// `featurelock: {json}`.
    FeatureLock(&'a str),
    /// `restrictedCommands: {json}`.
    RestrictedCommands(&'a str),
    /// `blockedcommand: cmd=.. kind=..`.
    BlockedCommand(&'a str),
    /// `updateroutetoken <token>`.
    UpdateRouteToken(&'a str),
    /// `reload`.
    Reload,
    /// `status:` or `statusupdate:`.
    Status(&'a str),
    /// `progress: {json}`.
    Progress(&'a str),
    /// Everything else, routed to the document layer.
    Document,
}

/// Prefix table, checked in order. Longer prefixes sharing a stem come
/// first.
const PREFIXES: &[(&str, Kind)] = &[
    ("coolserver ", Kind::CoolServer),
    ("lokitversion ", Kind::LokitVersion),
    ("enabletraceeventlogging ", Kind::EnableTraceEventLogging),
    ("osinfo ", Kind::OsInfo),
    ("clipboardkey: ", Kind::ClipboardKey),
    ("perm:", Kind::Perm),
    ("filemode:", Kind::FileMode),
    ("lockfailed:", Kind::LockFailed),
    ("wopi:", Kind::Wopi),
    ("loadstorage: ", Kind::LoadStorage),
    ("lastmodtime: ", Kind::LastModTime),
    ("commandresult: ", Kind::CommandResult),
    ("migrate: ", Kind::Migrate),
    ("close: ", Kind::Close),
    ("error:", Kind::Error),
    ("fontsmissing: ", Kind::FontsMissing),
    ("info: ", Kind::Info),
    ("saveas:", Kind::SaveAs),
    ("renamefile:", Kind::RenameFile),
    ("exportas:", Kind::ExportAs),
    ("warn: ", Kind::Warn),
    ("blockui:", Kind::BlockUi),
    ("unblockui:", Kind::UnblockUi),
    ("featurelock: ", Kind::FeatureLock),
    ("restrictedCommands: ", Kind::RestrictedCommands),
    ("blockedcommand: ", Kind::BlockedCommand),
    ("updateroutetoken", Kind::UpdateRouteToken),
    ("reload", Kind::Reload),
    ("statusupdate:", Kind::Status),
    ("status:", Kind::Status),
    ("progress:", Kind::Progress),
];

#[derive(Clone, Copy, Debug)]
enum Kind {
    CoolServer,
    LokitVersion,
    EnableTraceEventLogging,
    OsInfo,
    ClipboardKey,
    Perm,
    FileMode,
    LockFailed,
    Wopi,
    LoadStorage,
    LastModTime,
    CommandResult,
    Migrate,
    Close,
    Error,
    FontsMissing,
    Info,
    SaveAs,
    RenameFile,
    ExportAs,
    Warn,
    BlockUi,
    UnblockUi,
    FeatureLock,
    RestrictedCommands,
    BlockedCommand,
    UpdateRouteToken,
    Reload,
    Status,
    Progress,
}

impl<'a> Message<'a> {
    /// Classify `text` by its prefix.
    ///
    /// ```
    /// use docwire::Message;
    ///
    /// assert_eq!(Message::parse("perm: readonly"), Message::Perm("readonly"));
    /// assert_eq!(Message::parse("close: idle"), Message::Close("idle"));
    /// assert_eq!(Message::parse("invalidatetiles: part=0"), Message::Document);
    /// ```
    #[must_use]
    pub fn parse(text: &'a str) -> Self {
        let Some((prefix, kind)) = PREFIXES.iter().find(|(p, _)| text.starts_with(p)) else {
            return Message::Document;
        };
        let rest = &text[prefix.len()..];
        let token = rest.trim();
        let json = json_body(text);
        match kind {
            Kind::CoolServer => Message::CoolServer(json),
            Kind::LokitVersion => Message::LokitVersion(json),
            Kind::EnableTraceEventLogging => Message::EnableTraceEventLogging(token),
            Kind::OsInfo => Message::OsInfo(token),
            Kind::ClipboardKey => Message::ClipboardKey(token),
            Kind::Perm => Message::Perm(token),
            Kind::FileMode => Message::FileMode(json),
            Kind::LockFailed => Message::LockFailed(token),
            Kind::Wopi => Message::Wopi(json),
            Kind::LoadStorage => Message::LoadStorage(token),
            Kind::LastModTime => Message::LastModTime(token),
            Kind::CommandResult => Message::CommandResult(json),
            Kind::Migrate => Message::Migrate(json),
            Kind::Close => Message::Close(token),
            Kind::Error => Message::Error,
            Kind::FontsMissing => Message::FontsMissing(json),
            Kind::Info => Message::Info,
            Kind::SaveAs => Message::SaveAs,
            Kind::RenameFile => Message::RenameFile,
            Kind::ExportAs => Message::ExportAs,
            Kind::Warn => Message::Warn(rest),
            Kind::BlockUi => Message::BlockUi(token),
            Kind::UnblockUi => Message::UnblockUi,
            Kind::FeatureLock => Message::FeatureLock(json),
            Kind::RestrictedCommands => Message::RestrictedCommands(json),
            Kind::BlockedCommand => Message::BlockedCommand(rest),
            Kind::UpdateRouteToken => Message::UpdateRouteToken(token),
            Kind::Reload if token.is_empty() => Message::Reload,
            Kind::Reload => Message::Document,
            Kind::Status => Message::Status(json),
            Kind::Progress => Message::Progress(json),
        }
    }

    /// Short name of the kind, for logs and metrics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Message::CoolServer(_) => "coolserver",
            Message::LokitVersion(_) => "lokitversion",
            Message::EnableTraceEventLogging(_) => "enabletraceeventlogging",
            Message::OsInfo(_) => "osinfo",
            Message::ClipboardKey(_) => "clipboardkey",
            Message::Perm(_) => "perm",
            Message::FileMode(_) => "filemode",
            Message::LockFailed(_) => "lockfailed",
            Message::Wopi(_) => "wopi",
            Message::LoadStorage(_) => "loadstorage",
            Message::LastModTime(_) => "lastmodtime",
            Message::CommandResult(_) => "commandresult",
            Message::Migrate(_) => "migrate",
            Message::Close(_) => "close",
            Message::Error => "error",
            Message::FontsMissing(_) => "fontsmissing",
            Message::Info => "info",
            Message::SaveAs => "saveas",
            Message::RenameFile => "renamefile",
            Message::ExportAs => "exportas",
            Message::Warn(_) => "warn",
            Message::BlockUi(_) => "blockui",
            Message::UnblockUi => "unblockui",
            Message::FeatureLock(_) => "featurelock",
            Message::RestrictedCommands(_) => "restrictedcommands",
            Message::BlockedCommand(_) => "blockedcommand",
            Message::UpdateRouteToken(_) => "updateroutetoken",
            Message::Reload => "reload",
            Message::Status(_) => "status",
            Message::Progress(_) => "progress",
            Message::Document => "document",
        }
    }
}

/// JSON object embedded in `text`, starting at the first `{`.
#[must_use]
pub fn json_body(text: &str) -> &str { text.find('{').map_or("", |index| &text[index..]) }
