//! A [`View`] that records what the engine asked of it.

use std::sync::{Arc, Mutex, MutexGuard};

use docwire::{DocumentMessage, Notification, Permission, TransactionDone, View};

#[derive(Debug)]
struct ViewState {
    cost: u32,
    permission: Permission,
    part: Option<u32>,
    notifications: Vec<Notification>,
    delivered: Vec<String>,
    permissions: Vec<Permission>,
    begun: usize,
    ended: usize,
    hold_transactions: bool,
    held: Vec<TransactionDone>,
    panic_on: Option<String>,
}

/// Cloneable recording view; clones share state.
#[derive(Clone, Debug)]
pub struct RecordingView {
    state: Arc<Mutex<ViewState>>,
}

impl Default for RecordingView {
    fn default() -> Self { Self::new() }
}

impl RecordingView {
    /// A view with edit permission, zero render cost and transactions that
    /// complete immediately.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ViewState {
                cost: 0,
                permission: Permission::Edit,
                part: None,
                notifications: Vec::new(),
                delivered: Vec::new(),
                permissions: Vec::new(),
                begun: 0,
                ended: 0,
                hold_transactions: false,
                held: Vec::new(),
                panic_on: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> { self.state.lock().expect("view poisoned") }

    /// Set the predicted render cost.
    pub fn set_cost(&self, cost: u32) { self.lock().cost = cost; }

    /// Set the part reported by [`View::current_part`].
    pub fn set_part(&self, part: Option<u32>) { self.lock().part = part; }

    /// Keep transaction tokens until [`complete_transactions`](Self::complete_transactions).
    pub fn hold_transactions(&self, hold: bool) { self.lock().hold_transactions = hold; }

    /// Complete every held transaction.
    pub fn complete_transactions(&self) {
        let held = std::mem::take(&mut self.lock().held);
        for done in held {
            done.complete();
        }
    }

    /// Panic when a document message starting with `prefix` is delivered.
    pub fn panic_on(&self, prefix: &str) { self.lock().panic_on = Some(prefix.to_owned()); }

    /// Notifications so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> { self.lock().notifications.clone() }

    /// Forget recorded notifications.
    pub fn clear_notifications(&self) { self.lock().notifications.clear(); }

    /// Texts of delivered document messages, in order.
    #[must_use]
    pub fn delivered(&self) -> Vec<String> { self.lock().delivered.clone() }

    /// Permissions the engine set, in order.
    #[must_use]
    pub fn permissions(&self) -> Vec<Permission> { self.lock().permissions.clone() }

    /// Started and finished render transactions.
    #[must_use]
    pub fn transactions(&self) -> (usize, usize) {
        let state = self.lock();
        (state.begun, state.ended)
    }
}

impl View for RecordingView {
    fn predict_render_cost(&self) -> u32 { self.lock().cost }

    fn begin_render_transaction(&mut self) { self.lock().begun += 1; }

    fn end_render_transaction(&mut self, done: TransactionDone) {
        let mut state = self.lock();
        state.ended += 1;
        if state.hold_transactions {
            state.held.push(done);
        } else {
            drop(state);
            done.complete();
        }
    }

    fn notify(&mut self, notification: Notification) { self.lock().notifications.push(notification); }

    fn current_permission(&self) -> Permission { self.lock().permission }

    fn set_permission(&mut self, permission: Permission) {
        let mut state = self.lock();
        state.permission = permission;
        state.permissions.push(permission);
    }

    fn deliver(&mut self, message: DocumentMessage<'_>) {
        let panic_on = {
            let mut state = self.lock();
            state.delivered.push(message.text.to_owned());
            state.panic_on.clone()
        };
        if panic_on.is_some_and(|prefix| message.text.starts_with(&prefix)) {
            panic!("view failed on {}", message.text);
        }
    }

    fn current_part(&self) -> Option<u32> { self.lock().part }
}
