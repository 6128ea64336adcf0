//! Session actor owning all protocol state.
//!
//! The actor waits on a shutdown token, three timers and one event channel
//! using a `tokio::select!` loop. The `biased` keyword makes shutdown win
//! over everything, and due timers win over new events, so a flood of
//! frames cannot starve batch emission or reconnects.
//!
//! Socket callbacks, image decodes, view completions and host requests all
//! arrive as [`SessionEvent`] values on the same channel. Handlers therefore
//! never run concurrently and never see partially updated state.

mod emit;
mod event;
mod handle;
mod lifecycle;

use std::{collections::VecDeque, sync::Arc};

pub(crate) use event::SessionEvent;
use event::{HostCommand, Wake};
pub use handle::SessionHandle;
use log::{debug, info};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Duration, Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    command::ServerCommand,
    config::SessionConfig,
    connection::{Connection, ExpiryWarning, WallClock},
    frame::InboundFrame,
    recovery::{Recovery, RecoveryState},
    session::{Permission, ServerIdentity, Session},
    slurp::{SlurpQueue, SlurpState},
    transport::{Connector, ReadyState},
    view::{PasswordKind, View},
};

/// Point-in-time view of a session, for hosts and tests.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    /// Generation of the current connection; bumps on every connect.
    pub generation: u64,
    /// State of the current socket, if one was ever created.
    pub ready_state: Option<ReadyState>,
    /// Effective permission.
    pub permission: Permission,
    /// Health of the session.
    pub recovery: RecoveryState,
    /// State of the emission queue.
    pub slurp: SlurpState,
    /// Frames waiting in the emission queue.
    pub buffered: usize,
    /// Frames held back until the document first loads.
    pub delayed: usize,
    /// Messages waiting for the socket to open.
    pub queued: usize,
    /// Whether the user is considered active.
    pub active: bool,
    /// Whether the document reported ready on the current connection.
    pub document_ready: bool,
    /// Whether the document ever loaded.
    pub loaded_once: bool,
    /// Whether emission waits for an answer from the user.
    pub paused: bool,
    /// Earliest retry deadline.
    pub retry_deadline: Option<Instant>,
    /// Period of the running reconnect loop.
    pub reconnect_period: Option<Duration>,
    /// When the token-expiry warning fires next.
    pub expiry_deadline: Option<Instant>,
    /// Server identity last announced.
    pub server: Option<ServerIdentity>,
}

/// A prompt the engine is waiting on.
#[derive(Debug)]
pub(crate) enum Prompt {
    Password(PasswordKind),
    Conflict,
    SaveAs(ServerCommand),
}

/// Frame held back until the document has loaded once.
#[derive(Debug)]
pub(crate) struct Delayed {
    pub(crate) text: String,
    pub(crate) frame: InboundFrame,
}

/// The single owner of a session's state.
///
/// Build one with [`SessionActor::new`], keep the returned
/// [`SessionHandle`], then drive the actor with [`run`](Self::run) or
/// [`spawn`](Self::spawn).
pub struct SessionActor<V: View> {
    pub(crate) config: SessionConfig,
    pub(crate) session: Session,
    pub(crate) view: V,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) connection: Option<Connection>,
    pub(crate) generation: u64,
    pub(crate) slurp: SlurpQueue,
    pub(crate) recovery: Recovery,
    pub(crate) delayed: VecDeque<Delayed>,
    pub(crate) clock: WallClock,
    pub(crate) expiry: Option<ExpiryWarning>,
    pub(crate) suspended_expiry: Option<ExpiryWarning>,
    pub(crate) prompt: Option<Prompt>,
    pub(crate) paused: bool,
    pub(crate) tx: mpsc::UnboundedSender<SessionEvent>,
    rx: mpsc::UnboundedReceiver<SessionEvent>,
    shutdown: CancellationToken,
}

impl<V: View> SessionActor<V> {
    /// Create an actor for `config`, reporting to `view`, opening sockets
    /// through `connector`.
    #[must_use]
    pub fn new(config: SessionConfig, view: V, connector: Arc<dyn Connector>) -> (Self, SessionHandle) {
        let config = config.normalized();
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let handle = SessionHandle::new(tx.clone(), shutdown.clone());
        let actor = Self {
            session: Session::new(&config),
            slurp: SlurpQueue::new(config.slurp),
            recovery: Recovery::new(config.recovery),
            config,
            view,
            connector,
            connection: None,
            generation: 0,
            delayed: VecDeque::new(),
            clock: WallClock::start(),
            expiry: None,
            suspended_expiry: None,
            prompt: None,
            paused: false,
            tx,
            rx,
            shutdown,
        };
        (actor, handle)
    }

    /// Seed the reconnect jitter for reproducible runs.
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.recovery = Recovery::with_seed(self.config.recovery, seed);
        self
    }

    /// Replace the wall clock used for the hello and the expiry warning.
    #[must_use]
    pub fn with_clock(mut self, clock: WallClock) -> Self {
        self.clock = clock;
        self
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> { tokio::spawn(self.run()) }

    /// Process events until [`SessionHandle::shutdown`] is called.
    pub async fn run(mut self) {
        let span = tracing::info_span!("session", document = %self.config.document.url);
        async move {
            info!("session started: document={}", self.config.document.url);
            loop {
                match self.next_wake().await {
                    Wake::Shutdown => break,
                    Wake::SlurpDue => self.on_slurp_due(),
                    Wake::RetryDue => self.on_retry_due(),
                    Wake::ExpiryDue => self.on_expiry_due(),
                    Wake::Event(event) => self.on_event(event),
                }
            }
            self.close_connection(None, None);
            info!("session stopped: generation={}", self.generation);
        }
        .instrument(span)
        .await;
    }

    /// Wait for the next thing to do.
    ///
    /// Shutdown is observed first, then the emission timer, then retry
    /// timers, then the expiry warning, and finally the event channel. The
    /// emission timer is ignored while a prompt pauses emission.
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus operations internally"
    )]
    async fn next_wake(&mut self) -> Wake {
        let slurp = if self.paused { None } else { self.slurp.deadline() };
        let retry = self.recovery.next_deadline();
        let expiry = self.expiry.as_ref().map(ExpiryWarning::deadline);

        tokio::select! {
            biased;

            () = self.shutdown.cancelled() => Wake::Shutdown,
            () = wait_until(slurp), if slurp.is_some() => Wake::SlurpDue,
            () = wait_until(retry), if retry.is_some() => Wake::RetryDue,
            () = wait_until(expiry), if expiry.is_some() => Wake::ExpiryDue,
            event = self.rx.recv() => event.map_or(Wake::Shutdown, Wake::Event),
        }
    }

    fn on_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Socket { generation, event } => self.on_socket(generation, event),
            SessionEvent::Command(command) => self.on_command(command),
            SessionEvent::ImageSettled => self.on_image_settled(),
            SessionEvent::TransactionComplete(id) => self.on_transaction_complete(id),
        }
    }

    fn on_command(&mut self, command: HostCommand) {
        match command {
            HostCommand::Connect(existing) => self.connect(existing),
            HostCommand::Send(message) => self.send_message(message),
            HostCommand::Activate => self.activate(),
            HostCommand::Deactivate => self.deactivate(),
            HostCommand::SubmitPassword(password) => self.submit_password(password),
            HostCommand::CancelPassword => self.cancel_password(),
            HostCommand::ResolveConflict(resolution) => self.resolve_conflict(resolution),
            HostCommand::AnswerSaveAs(join) => self.answer_save_as(join),
            HostCommand::Close { code, reason } => self.close_connection(code, reason.as_deref()),
            HostCommand::Snapshot(reply) => {
                if reply.send(self.snapshot()).is_err() {
                    debug!("snapshot requester went away");
                }
            }
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            generation: self.generation,
            ready_state: self.connection.as_ref().map(Connection::ready_state),
            permission: self.session.permission(),
            recovery: self.recovery.state(),
            slurp: self.slurp.state(),
            buffered: self.slurp.len(),
            delayed: self.delayed.len(),
            queued: self.connection.as_ref().map_or(0, Connection::queued),
            active: self.session.active,
            document_ready: self.session.document_ready,
            loaded_once: self.session.loaded_once,
            paused: self.paused,
            retry_deadline: self.recovery.next_deadline(),
            reconnect_period: self.recovery.loop_period(),
            expiry_deadline: self.expiry.as_ref().map(ExpiryWarning::deadline),
            server: self.session.server().cloned(),
        }
    }

    /// State of the current socket, if any.
    pub(crate) fn ready_state(&self) -> Option<ReadyState> {
        self.connection.as_ref().map(Connection::ready_state)
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
