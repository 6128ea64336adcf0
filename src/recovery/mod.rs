//! Error and reconnect state machine.
//!
//! Recoverable failures are grouped into [`RetryCategory`] values. Each
//! category owns at most one timer; arming a category replaces its previous
//! timer. Activating a category that is already active reports `false` so
//! the caller notifies the user once per activation rather than on every
//! timer fire.

mod backoff;

use std::collections::HashMap;

pub use backoff::{RecoveryConfig, jitter, unloading_delay};
use rand::{SeedableRng, rngs::StdRng};
use tokio::time::{Duration, Instant};

/// Category of a recoverable failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RetryCategory {
    /// The server is still unloading a previous instance of the document.
    DocumentUnloading,
    /// The socket dropped or the server is recycling.
    ConnectionLost,
    /// Waiting for the user to supply a password.
    PasswordRetry,
    /// A single reconnect or page reload is scheduled.
    ScheduledReload,
    /// A reconnect towards another cluster node or route is scheduled.
    Rerouting,
}

/// What to do when a retry timer fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryAction {
    /// Reopen the connection if it is not open.
    Reconnect,
    /// Ask the host to reload the whole client.
    ReloadPage,
}

/// Summary state of the session's health.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryState {
    /// Nothing is being recovered.
    Healthy,
    /// At least one category is active; the oldest is reported.
    Recovering(RetryCategory),
    /// Automatic recovery was abandoned; user activity may restart it.
    GivenUp,
    /// Terminal: the session must be recreated.
    Fatal,
}

/// Outcome of [`Recovery::unloading_retry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnloadingRetry {
    /// Retry scheduled.
    Scheduled {
        /// 1-based attempt number.
        attempt: u32,
        /// Delay until the retry fires.
        delay: Duration,
        /// Whether this activated the category (notify the user).
        first: bool,
    },
    /// The attempt cap was reached.
    GaveUp,
}

/// Outcome of [`Recovery::wrong_server`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrongServer {
    /// Reconnect and try to reach the expected node again.
    Retry {
        /// 1-based attempt number.
        attempt: u32,
    },
    /// Too many mismatches in a row.
    GiveUp,
}

#[derive(Clone, Copy, Debug)]
struct RetryTimer {
    deadline: Instant,
    period: Option<Duration>,
    action: RetryAction,
}

/// Recovery bookkeeping for one session.
#[derive(Debug)]
pub struct Recovery {
    config: RecoveryConfig,
    timers: HashMap<RetryCategory, RetryTimer>,
    active: Vec<RetryCategory>,
    unloading_attempts: u32,
    wrong_server_attempts: u32,
    given_up: bool,
    fatal: bool,
    rng: StdRng,
}

impl Recovery {
    /// Create a healthy recovery state.
    #[must_use]
    pub fn new(config: RecoveryConfig) -> Self { Self::with_rng(config, StdRng::from_entropy()) }

    /// Create a recovery state with a seeded jitter source.
    #[must_use]
    pub fn with_seed(config: RecoveryConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: RecoveryConfig, rng: StdRng) -> Self {
        Self {
            config: config.normalized(),
            timers: HashMap::new(),
            active: Vec::new(),
            unloading_attempts: 0,
            wrong_server_attempts: 0,
            given_up: false,
            fatal: false,
            rng,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &RecoveryConfig { &self.config }

    /// Current summary state.
    #[must_use]
    pub fn state(&self) -> RecoveryState {
        if self.fatal {
            RecoveryState::Fatal
        } else if self.given_up {
            RecoveryState::GivenUp
        } else if let Some(category) = self.active.first() {
            RecoveryState::Recovering(*category)
        } else {
            RecoveryState::Healthy
        }
    }

    /// Whether the session is terminal.
    #[must_use]
    pub fn is_fatal(&self) -> bool { self.fatal }

    /// Whether `category` is currently active.
    #[must_use]
    pub fn is_active(&self, category: RetryCategory) -> bool { self.active.contains(&category) }

    /// Whether `category` has a live timer.
    #[must_use]
    pub fn has_timer(&self, category: RetryCategory) -> bool { self.timers.contains_key(&category) }

    /// Scheduled unloading retries so far.
    #[must_use]
    pub fn unloading_attempts(&self) -> u32 { self.unloading_attempts }

    /// Consecutive wrong-node reconnects so far.
    #[must_use]
    pub fn wrong_server_attempts(&self) -> u32 { self.wrong_server_attempts }

    /// Enter the terminal state, dropping every timer.
    pub fn mark_fatal(&mut self) {
        self.fatal = true;
        self.timers.clear();
        self.active.clear();
    }

    /// Activate `category`; returns `true` only on a new activation.
    pub fn activate(&mut self, category: RetryCategory) -> bool {
        if self.fatal || self.active.contains(&category) {
            return false;
        }
        self.active.push(category);
        true
    }

    /// Cancel the timer and activation of `category`.
    pub fn cancel(&mut self, category: RetryCategory) -> bool {
        let had_timer = self.timers.remove(&category).is_some();
        let was_active = self.active.contains(&category);
        self.active.retain(|c| *c != category);
        had_timer || was_active
    }

    fn arm(
        &mut self,
        category: RetryCategory,
        delay: Duration,
        period: Option<Duration>,
        action: RetryAction,
        now: Instant,
    ) {
        let replaced = self.timers.insert(
            category,
            RetryTimer {
                deadline: now + delay,
                period,
                action,
            },
        );
        if replaced.is_some() {
            log::debug!("retry timer replaced: category={category:?}");
        }
    }

    /// Schedule the next document-unloading retry.
    ///
    /// Retry *n* fires `unloading_base·n²` after this call. Once
    /// `unloading_max_attempts` retries have been scheduled the category is
    /// abandoned and [`UnloadingRetry::GaveUp`] is returned.
    pub fn unloading_retry(&mut self, now: Instant) -> UnloadingRetry {
        if self.fatal {
            return UnloadingRetry::GaveUp;
        }
        if self.unloading_attempts >= self.config.unloading_max_attempts {
            self.cancel(RetryCategory::DocumentUnloading);
            self.given_up = true;
            return UnloadingRetry::GaveUp;
        }
        self.unloading_attempts += 1;
        let attempt = self.unloading_attempts;
        let delay = unloading_delay(self.config.unloading_base, attempt);
        self.arm(
            RetryCategory::DocumentUnloading,
            delay,
            None,
            RetryAction::Reconnect,
            now,
        );
        let first = self.activate(RetryCategory::DocumentUnloading);
        UnloadingRetry::Scheduled {
            attempt,
            delay,
            first,
        }
    }

    /// Start the reconnect loop after an unexpected close.
    ///
    /// An already running loop (for example one started by server
    /// recycling) is left untouched. Returns `true` on a new activation.
    pub fn connection_lost(&mut self, now: Instant) -> bool {
        if self.fatal {
            return false;
        }
        if !self.has_timer(RetryCategory::ConnectionLost) {
            let period = self.next_jitter();
            self.arm(
                RetryCategory::ConnectionLost,
                self.config.lost_first_delay,
                Some(period),
                RetryAction::Reconnect,
                now,
            );
        }
        self.activate(RetryCategory::ConnectionLost)
    }

    /// Start the jittered reconnect loop for a recycling server.
    ///
    /// Returns the chosen period and whether the category was newly
    /// activated.
    pub fn recycling(&mut self, now: Instant) -> (Duration, bool) {
        if self.fatal {
            return (Duration::ZERO, false);
        }
        let period = self.next_jitter();
        self.arm(
            RetryCategory::ConnectionLost,
            period,
            Some(period),
            RetryAction::Reconnect,
            now,
        );
        (period, self.activate(RetryCategory::ConnectionLost))
    }

    /// Schedule a single reconnect or reload after `delay`.
    pub fn schedule_reload(&mut self, delay: Duration, action: RetryAction, now: Instant) -> bool {
        if self.fatal {
            return false;
        }
        self.arm(RetryCategory::ScheduledReload, delay, None, action, now);
        self.activate(RetryCategory::ScheduledReload)
    }

    /// Schedule a reconnect that moves the session to another node.
    ///
    /// Kept apart from [`RetryCategory::ScheduledReload`] so a pending page
    /// reload survives it.
    pub fn schedule_reroute(&mut self, delay: Duration, now: Instant) -> bool {
        if self.fatal {
            return false;
        }
        self.arm(RetryCategory::Rerouting, delay, None, RetryAction::Reconnect, now);
        self.activate(RetryCategory::Rerouting)
    }

    /// Wait for the user to supply a password.
    pub fn await_password(&mut self) -> bool { self.activate(RetryCategory::PasswordRetry) }

    /// Record a server identity that did not match the expected node.
    pub fn wrong_server(&mut self) -> WrongServer {
        if self.wrong_server_attempts >= self.config.wrong_server_max_attempts {
            self.wrong_server_attempts = 0;
            return WrongServer::GiveUp;
        }
        self.wrong_server_attempts += 1;
        WrongServer::Retry {
            attempt: self.wrong_server_attempts,
        }
    }

    /// Record that we reached the expected node (or none was expected).
    pub fn server_confirmed(&mut self) { self.wrong_server_attempts = 0; }

    /// The socket opened: the connection-lost loop is done.
    pub fn reconnected(&mut self) -> bool { self.cancel(RetryCategory::ConnectionLost) }

    /// The document reported ready: reset counters and stop retrying.
    pub fn document_ready(&mut self) {
        self.unloading_attempts = 0;
        self.given_up = false;
        for category in [
            RetryCategory::DocumentUnloading,
            RetryCategory::ConnectionLost,
            RetryCategory::PasswordRetry,
        ] {
            self.cancel(category);
        }
    }

    /// Leave the given-up state after user activity.
    pub fn resume(&mut self) {
        if !self.fatal {
            self.given_up = false;
            self.unloading_attempts = 0;
        }
    }

    /// Earliest pending timer deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.deadline).min()
    }

    /// Collect timers due at `now`.
    ///
    /// Periodic timers are re-armed one period from `now`; single-shot
    /// timers are removed, and a fired reload or reroute also deactivates
    /// its category.
    pub fn take_due(&mut self, now: Instant) -> Vec<(RetryCategory, RetryAction)> {
        let mut due: Vec<(Instant, RetryCategory, RetryAction)> = self
            .timers
            .iter()
            .filter(|(_, t)| t.deadline <= now)
            .map(|(c, t)| (t.deadline, *c, t.action))
            .collect();
        due.sort_by_key(|(deadline, ..)| *deadline);
        for (_, category, _) in &due {
            let period = self.timers.get(category).and_then(|t| t.period);
            if let Some(period) = period {
                if let Some(timer) = self.timers.get_mut(category) {
                    timer.deadline = now + period;
                }
            } else {
                self.timers.remove(category);
                if matches!(category, RetryCategory::ScheduledReload | RetryCategory::Rerouting) {
                    self.active.retain(|c| c != category);
                }
            }
        }
        due.into_iter().map(|(_, c, a)| (c, a)).collect()
    }

    /// Period of the running connection-lost loop, if any.
    #[must_use]
    pub fn loop_period(&self) -> Option<Duration> {
        self.timers
            .get(&RetryCategory::ConnectionLost)
            .and_then(|t| t.period)
    }

    /// Deadline of `category`'s timer, if armed.
    #[must_use]
    pub fn deadline_of(&self, category: RetryCategory) -> Option<Instant> {
        self.timers.get(&category).map(|t| t.deadline)
    }

    fn next_jitter(&mut self) -> Duration {
        jitter(&mut self.rng, self.config.jitter_min, self.config.jitter_max)
    }
}

#[cfg(test)]
mod tests;
