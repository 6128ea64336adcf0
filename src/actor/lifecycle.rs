//! Connection lifecycle: connect, open, close, send and user activity.

use log::{debug, error, info, trace, warn};
use serde_json::json;
use tokio::time::{Duration, Instant};

use super::{Prompt, SessionActor};
use crate::{
    command::ServerCommand,
    connection::{Connection, ExpiryWarning, LoadRequest, client_hello, encode_component, socket_url},
    dispatch,
    error::SessionError,
    frame::loggable,
    metrics,
    outbound::OutboundMessage,
    recovery::{RetryAction, RetryCategory},
    session::Permission,
    strings,
    transport::{CloseEvent, EventSink, ReadyState, Socket, SocketEvent},
    view::{ConflictResolution, Notification, PasswordKind, View},
};

impl<V: View> SessionActor<V> {
    /// Replace the current connection with a new one.
    ///
    /// `existing` is adopted when it is still connecting or open; otherwise
    /// a socket is created through the connector. Messages queued on a
    /// connection that never opened move to the new one.
    pub(crate) fn connect(&mut self, existing: Option<Box<dyn Socket>>) {
        if self.recovery.is_fatal() {
            debug!("connect ignored: session is fatal");
            return;
        }
        self.close_connection(None, None);
        let carried = self
            .connection
            .as_mut()
            .map(Connection::take_unsent)
            .unwrap_or_default();

        self.generation += 1;
        let sink = EventSink::new(self.generation, self.tx.clone());
        let adopted = existing.filter(|socket| socket.ready_state().is_live());
        let opened = match adopted {
            Some(socket) => Ok(Connection::adopt(socket, sink)),
            None => socket_url(&self.config, &self.session)
                .map_err(SessionError::from)
                .and_then(|url| {
                    info!("connecting: generation={}, url={url}", self.generation);
                    Connection::open(self.connector.as_ref(), &url, sink).map_err(SessionError::from)
                }),
        };
        let mut connection = match opened {
            Ok(connection) => connection,
            Err(e) => {
                error!("connection failed: generation={}, error={e}", self.generation);
                self.connection = None;
                self.fail(format!("{}{e}", strings::branded(strings::CONNECT_FAILED)));
                return;
            }
        };
        metrics::inc_connects();

        for message in carried {
            if let Err(e) = connection.enqueue(message) {
                warn!("carried message dropped: error={e}");
            }
        }
        self.arm_expiry();
        let already_open = connection.ready_state() == ReadyState::Open;
        self.connection = Some(connection);
        if already_open {
            // The creator of an adopted open socket already sent the handshake.
            self.on_open(false);
        }
    }

    /// Arm the token-expiry warning unless it already tracks this token.
    ///
    /// A warning suspended by a close resumes on its old schedule.
    fn arm_expiry(&mut self) {
        let suspended = self.suspended_expiry.take();
        let doc = self.session.document();
        let Some(expires_at_ms) = doc.access_token.as_ref().and(doc.access_token_ttl) else {
            self.expiry = None;
            return;
        };
        if self.expiry.is_some_and(|e| e.expires_at_ms() == expires_at_ms) {
            return;
        }
        if let Some(previous) = suspended.filter(|e| e.expires_at_ms() == expires_at_ms) {
            self.expiry = Some(previous);
            return;
        }
        let now_ms = self.clock.epoch_ms_u64();
        self.expiry = Some(ExpiryWarning::arm(expires_at_ms, now_ms, Instant::now()));
        debug!("expiry warning armed: expires_at_ms={expires_at_ms}, now_ms={now_ms}");
    }

    /// Close the current connection locally, keeping it as the current one
    /// so a later send reconnects.
    ///
    /// The expiry warning stops until the next connect.
    pub(crate) fn close_connection(&mut self, code: Option<u16>, reason: Option<&str>) {
        if let Some(expiry) = self.expiry.take() {
            self.suspended_expiry = Some(expiry);
        }
        let Some(connection) = self.connection.as_mut() else {
            trace!("close ignored: no connection");
            return;
        };
        if connection.close(code, reason) {
            self.session.document_ready = false;
            self.view.notify(Notification::DocumentLoaded(false));
        }
    }

    pub(super) fn on_socket(&mut self, generation: u64, event: SocketEvent) {
        let current = self
            .connection
            .as_ref()
            .is_some_and(|c| c.generation() == generation && !c.is_closed());
        if !current {
            trace!("stale socket event dropped: generation={generation}, event={event:?}");
            return;
        }
        match event {
            SocketEvent::Opened => self.on_open(true),
            SocketEvent::Frame(raw) => self.on_frame(raw),
            SocketEvent::Error(message) => {
                warn!("socket error: generation={generation}, error={message}");
                self.view.notify(Notification::HideBusy);
            }
            SocketEvent::Closed(close) => self.on_close(&close),
        }
    }

    /// The current socket opened: handshake, flush and go active.
    fn on_open(&mut self, handshake: bool) {
        info!("socket opened: generation={}", self.generation);
        self.session.server_recycling = false;
        self.session.document_idle = false;
        if handshake {
            self.write(client_hello(&self.clock));
            let part = if self.session.loaded_once {
                self.session.reconnecting = true;
                self.view.current_part()
            } else {
                None
            };
            let load = LoadRequest::new(&self.config, self.session.document())
                .with_part(part)
                .to_string();
            self.write(load);
        }
        if let Some(connection) = self.connection.as_mut() {
            match connection.flush() {
                Ok(0) => {}
                Ok(sent) => debug!("queued messages flushed: count={sent}"),
                Err(e) => warn!("flush failed: error={e}"),
            }
        }
        self.session.active = true;
        if self.recovery.reconnected() {
            debug!("reconnect loop stopped: generation={}", self.generation);
        }
    }

    /// The peer closed the current socket.
    fn on_close(&mut self, close: &CloseEvent) {
        if let Some(connection) = self.connection.as_mut() {
            connection.mark_closed();
        }
        info!(
            "socket closed: generation={}, code={:?}, reason={}",
            self.generation, close.code, close.reason
        );
        if self.recovery.is_fatal() {
            return;
        }
        if !self.session.loaded_once && self.recovery.unloading_attempts() == 0 {
            self.report_load_failure(&close.reason);
            return;
        }
        if self.recovery.unloading_attempts() > 0 {
            debug!("close during unloading retry: waiting for the timer");
            return;
        }

        let was_active = self.session.active;
        self.view.notify(Notification::HideBusy);
        self.session.active = false;
        self.session.server_recycling = false;
        self.session.document_ready = false;
        if !self.delayed.is_empty() {
            debug!("delayed frames dropped on close: count={}", self.delayed.len());
            self.delayed.clear();
        }
        if was_active && self.session.reconnecting {
            self.view.notify(Notification::Error {
                message: strings::CANNOT_CONNECT.to_owned(),
            });
        }
        self.view.notify(Notification::DocumentLoaded(false));

        if !self.session.document_idle {
            self.session.reconnecting = true;
            if self.recovery.connection_lost(Instant::now()) {
                self.view.notify(Notification::Busy {
                    message: strings::RECONNECTING.to_owned(),
                });
            }
        }
        if self.view.current_permission().can_edit() {
            self.view.set_permission(Permission::View);
        }
        if !self.config.disable_inactive_messages {
            self.view
                .notify(Notification::snackbar(strings::SERVER_DISCONNECTED));
        }
    }

    /// The socket closed before the document ever loaded: give up.
    fn report_load_failure(&mut self, reason: &str) {
        let (error_type, message) = if reason.starts_with("error:") {
            let command = ServerCommand::parse(reason);
            match (command.cmd(), command.kind()) {
                ("internal", "unauthorized") => {
                    ("websocketunauthorized", dispatch::unauthorized_message(&command))
                }
                ("storage", "loadfailed") => (
                    "websocketloadfailed",
                    dispatch::with_storage_host(strings::STORAGE_LOAD_FAILED, &self.session),
                ),
                _ => (
                    "websocketgenericfailure",
                    strings::SOCKET_GENERIC_FAILURE.to_owned(),
                ),
            }
        } else {
            (
                "websocketproxyfailure",
                strings::SOCKET_PROXY_FAILURE.to_owned(),
            )
        };
        warn!("socket closed before load: error_type={error_type}, reason={reason}");
        self.fail(message.clone());
        self.view.notify(Notification::post(
            "Action_Load_Resp",
            json!({
                "errorType": error_type,
                "success": false,
                "errorMsg": message,
                "result": "",
            }),
        ));
    }

    /// Enter the fatal state: notify once, stop all timers, close.
    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        if self.recovery.is_fatal() {
            return;
        }
        let message = message.into();
        error!("session failed: reason={message}");
        self.recovery.mark_fatal();
        self.session.active = false;
        self.view.notify(Notification::Fatal { message });
        self.close_connection(None, None);
        self.expiry = None;
        self.suspended_expiry = None;
    }

    /// Close now and reconnect to another node after `delay`.
    pub(crate) fn reroute(&mut self, delay: Duration) {
        info!("rerouting: delay={delay:?}");
        self.session.active = false;
        self.close_connection(None, None);
        self.recovery.schedule_reroute(delay, Instant::now());
    }

    /// Send a message, queueing it while the socket opens.
    pub(crate) fn send_message(&mut self, message: OutboundMessage) {
        if self.recovery.is_fatal() {
            trace!("message dropped: session is fatal");
            return;
        }
        let Some(state) = self.ready_state() else {
            warn!("message dropped: no connection");
            return;
        };
        if !self.session.active {
            let activity = message
                .as_text()
                .is_some_and(|t| t.starts_with("useractive") || t.starts_with("userinactive"));
            if !activity {
                debug!("message dropped while inactive: len={}", message.len());
                return;
            }
        }
        if self.session.ui_blocked {
            debug!("message dropped while the ui is blocked: len={}", message.len());
            return;
        }
        if matches!(state, ReadyState::Closing | ReadyState::Closed) {
            self.connect(None);
        }
        match self.ready_state() {
            Some(ReadyState::Open) => self.write(message),
            Some(_) => {
                if let Some(Err(e)) = self.connection.as_mut().map(|c| c.enqueue(message)) {
                    warn!("message dropped: error={e}");
                }
            }
            None => warn!("message dropped: reconnect failed"),
        }
    }

    /// Write straight to the open socket.
    pub(crate) fn write(&mut self, message: impl Into<OutboundMessage>) {
        let message = message.into();
        if let Some(text) = message.as_text() {
            if self.config.debug {
                debug!("outgoing: {text}");
            } else {
                trace!("outgoing: {}", loggable(text, self.config.log_frame_limit));
            }
        }
        let Some(connection) = self.connection.as_mut() else {
            warn!("write skipped: no connection");
            return;
        };
        if let Err(e) = connection.send(message) {
            warn!("write failed: generation={}, error={e}", self.generation);
        }
    }

    /// User activity from the host.
    pub(crate) fn activate(&mut self) {
        if self.recovery.is_fatal() {
            debug!("activate ignored: session is fatal");
            return;
        }
        self.recovery.resume();
        self.reactivate();
    }

    /// Become active again, reconnecting if needed.
    fn reactivate(&mut self) {
        let was_active = self.session.active;
        self.session.document_idle = false;
        match self.ready_state() {
            Some(ReadyState::Open) => {
                self.session.active = true;
                if !was_active {
                    self.write("useractive");
                }
            }
            Some(ReadyState::Connecting) => debug!("activate: socket still connecting"),
            _ => self.connect(None),
        }
    }

    pub(crate) fn deactivate(&mut self) {
        if self.session.active && self.ready_state() == Some(ReadyState::Open) {
            self.write("userinactive");
        }
        self.session.active = false;
    }

    pub(super) fn on_retry_due(&mut self) {
        for (category, action) in self.recovery.take_due(Instant::now()) {
            debug!("retry due: category={category:?}, action={action:?}");
            match action {
                RetryAction::ReloadPage => self.view.notify(Notification::ReloadPage),
                RetryAction::Reconnect => self.retry(category),
            }
        }
    }

    fn retry(&mut self, category: RetryCategory) {
        match self.ready_state() {
            Some(ReadyState::Open) if category == RetryCategory::ConnectionLost => {
                self.recovery.cancel(RetryCategory::ConnectionLost);
            }
            Some(ReadyState::Connecting) => debug!("retry skipped: socket still connecting"),
            _ => self.reactivate(),
        }
    }

    pub(super) fn on_expiry_due(&mut self) {
        let now_ms = self.clock.epoch_ms_u64();
        if let Some(expiry) = self.expiry.as_mut() {
            warn!("access token expiring: expires_at_ms={}", expiry.expires_at_ms());
            let notification = expiry.fire(now_ms, Instant::now());
            self.view.notify(notification);
        }
    }

    pub(crate) fn submit_password(&mut self, password: String) {
        if !matches!(self.prompt, Some(Prompt::Password(_))) {
            debug!("password submitted without a pending prompt");
        }
        self.prompt = None;
        self.paused = false;
        self.session.document_mut().password = Some(password);
        self.recovery.cancel(RetryCategory::PasswordRetry);
        self.connect(None);
    }

    pub(crate) fn cancel_password(&mut self) {
        let kind = match self.prompt.take() {
            Some(Prompt::Password(kind)) => Some(kind),
            other => {
                self.prompt = other;
                None
            }
        };
        self.paused = false;
        self.recovery.cancel(RetryCategory::PasswordRetry);
        if kind == Some(PasswordKind::ToModify) {
            info!("password to modify cancelled: opening read-only");
            self.session.document_mut().password = None;
            self.connect(None);
        } else {
            self.view
                .notify(Notification::post("UI_Cancel_Password", json!({})));
            self.view.notify(Notification::HideBusy);
        }
    }

    pub(crate) fn resolve_conflict(&mut self, resolution: ConflictResolution) {
        if !matches!(self.prompt, Some(Prompt::Conflict)) {
            warn!("conflict resolution without a pending conflict: {resolution:?}");
            return;
        }
        self.prompt = None;
        info!("document conflict resolved: {resolution:?}");
        match resolution {
            ConflictResolution::Discard => self.send_message("closedocument".into()),
            ConflictResolution::Overwrite => self.send_message("savetostorage force=1".into()),
            ConflictResolution::SaveToNewFile(name) => {
                if self.session.user_can_not_write_relative {
                    warn!("save to new file refused: storage forbids relative writes");
                } else {
                    let command = format!(
                        "saveas url=wopi:{} format= options=",
                        encode_component(&name)
                    );
                    self.send_message(command.into());
                }
            }
            ConflictResolution::Cancel => {}
        }
        self.resume_emission();
    }

    pub(crate) fn answer_save_as(&mut self, join: bool) {
        match self.prompt.take() {
            Some(Prompt::SaveAs(command)) => {
                if join {
                    self.join_saved_as(&command);
                }
            }
            other => {
                warn!("save-as answer without a pending prompt");
                self.prompt = other;
                return;
            }
        }
        self.resume_emission();
    }

    /// Lift a prompt pause and let buffered frames flow again.
    pub(crate) fn resume_emission(&mut self) {
        if !std::mem::take(&mut self.paused) {
            return;
        }
        if !self.slurp.is_empty() {
            let delay = self.slurp.config().min_delay;
            self.slurp.schedule(delay, Instant::now());
        }
    }
}
