//! `docwire` binary: open a document session and log what happens.
//!
//! Useful for checking a deployment end to end: connection, load,
//! reconnects and server notices are logged through `tracing`.

mod cli;

use std::{fs, sync::Arc};

use clap::Parser;
use docwire::{
    DocumentMessage,
    Notification,
    Permission,
    SessionActor,
    SessionConfig,
    TransactionDone,
    View,
    WebSocketConnector,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Progress of the session as seen from the binary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Loading,
    Loaded,
    Failed,
}

/// View that renders nothing and logs every notification.
struct LoggingView {
    permission: Permission,
    phase: watch::Sender<Phase>,
}

impl View for LoggingView {
    fn predict_render_cost(&self) -> u32 { 0 }

    fn begin_render_transaction(&mut self) {}

    fn end_render_transaction(&mut self, done: TransactionDone) { done.complete(); }

    fn notify(&mut self, notification: Notification) {
        match notification {
            Notification::Fatal { message } => {
                error!("fatal: {message}");
                self.phase.send_replace(Phase::Failed);
            }
            Notification::Error { message } | Notification::Warn { message } => warn!("{message}"),
            Notification::DocumentLoaded(true) => {
                info!("document loaded");
                self.phase.send_replace(Phase::Loaded);
            }
            Notification::PasswordPrompt { message, .. } => {
                error!("password required: {message}");
                self.phase.send_replace(Phase::Failed);
            }
            other => info!("notification: {other:?}"),
        }
    }

    fn current_permission(&self) -> Permission { self.permission }

    fn set_permission(&mut self, permission: Permission) {
        info!("permission: {permission}");
        self.permission = permission;
    }

    fn deliver(&mut self, message: DocumentMessage<'_>) {
        debug!(
            "document message: {}",
            docwire::frame::loggable(message.text, docwire::config::DEFAULT_LOG_FRAME_LIMIT)
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let base = match &cli.config {
        Some(path) => SessionConfig::from_json(&fs::read_to_string(path)?)?,
        None => SessionConfig::default(),
    };
    let config = cli.apply(base);
    config.validate()?;

    let (phase_tx, mut phase) = watch::channel(Phase::Loading);
    let view = LoggingView {
        permission: config.document.permission,
        phase: phase_tx,
    };
    let (actor, handle) = SessionActor::new(config, view, Arc::new(WebSocketConnector));
    let task = actor.spawn();
    handle.connect(None)?;

    tokio::select! {
        changed = phase.wait_for(|p| *p != Phase::Loading) => {
            if changed.is_ok_and(|p| *p == Phase::Loaded) {
                for message in cli.send {
                    handle.send_message(message)?;
                }
                tokio::signal::ctrl_c().await?;
            }
        }
        res = tokio::signal::ctrl_c() => res?,
    }

    info!("shutting down");
    handle.shutdown();
    task.await?;
    Ok(())
}
