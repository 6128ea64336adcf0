//! Inbound "slurp" queue.
//!
//! Frames are buffered and released in batches so the view performs one
//! re-layout per batch instead of one per frame. The coalescing delay comes
//! from the view's render-cost prediction, clamped to
//! [`SlurpConfig::min_delay`]..=[`SlurpConfig::max_delay`]. Each batch runs
//! inside a render transaction; a timer that fires while the previous
//! transaction is still open is deferred until the view reports completion.
//!
//! The queue itself is clock-agnostic: callers pass `now` and poll
//! [`SlurpQueue::deadline`], which keeps it deterministic under test.

mod timer;

use std::collections::VecDeque;

use serde::Deserialize;
use timer::EmissionTimer;
use tokio::time::{Duration, Instant};

use crate::{
    config::{millis, ms},
    frame::InboundFrame,
};

/// Timing bounds for batch emission.
///
/// ```
/// use std::time::Duration;
///
/// use docwire::slurp::SlurpConfig;
///
/// let cfg = SlurpConfig {
///     min_delay: Duration::ZERO,
///     max_delay: Duration::from_millis(50),
/// }
/// .normalized();
/// assert_eq!(cfg.min_delay, Duration::from_millis(1));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SlurpConfig {
    /// Smallest delay between arrival and emission.
    #[serde(deserialize_with = "millis::deserialize")]
    pub min_delay: Duration,
    /// Largest delay between arrival and emission.
    #[serde(deserialize_with = "millis::deserialize")]
    pub max_delay: Duration,
}

impl Default for SlurpConfig {
    fn default() -> Self {
        Self {
            min_delay: ms(1),
            max_delay: ms(50),
        }
    }
}

impl SlurpConfig {
    /// Clamp delays to at least 1 ms and order them.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.min_delay = self.min_delay.max(ms(1));
        self.max_delay = self.max_delay.max(ms(1));
        if self.min_delay > self.max_delay {
            std::mem::swap(&mut self.min_delay, &mut self.max_delay);
        }
        self
    }

    /// Emission delay for a predicted render cost (one unit per ms).
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use docwire::slurp::SlurpConfig;
    ///
    /// let cfg = SlurpConfig::default();
    /// assert_eq!(cfg.delay_for(0), Duration::from_millis(1));
    /// assert_eq!(cfg.delay_for(12), Duration::from_millis(12));
    /// assert_eq!(cfg.delay_for(400), Duration::from_millis(50));
    /// ```
    #[must_use]
    pub fn delay_for(&self, cost: u32) -> Duration {
        ms(u64::from(cost)).max(self.min_delay).min(self.max_delay)
    }
}

/// Observable state of the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlurpState {
    /// Nothing scheduled.
    Idle,
    /// An emission timer is pending.
    TimerArmed,
    /// A batch transaction is open.
    Emitting,
    /// The timer fired while a transaction was still open.
    EmittingBlockedInTransaction,
}

/// Outcome of [`SlurpQueue::fire`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fire {
    /// Begin a batch now.
    Emit,
    /// A transaction is still open; emission resumes when it completes.
    Deferred,
}

/// Identifier of one render transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

/// Buffer of inbound frames awaiting emission.
#[derive(Debug)]
pub struct SlurpQueue {
    config: SlurpConfig,
    frames: VecDeque<InboundFrame>,
    timer: Option<EmissionTimer>,
    transaction: Option<TransactionId>,
    next_transaction: u64,
    fired_in_transaction: bool,
}

impl SlurpQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new(config: SlurpConfig) -> Self {
        Self {
            config: config.normalized(),
            frames: VecDeque::new(),
            timer: None,
            transaction: None,
            next_transaction: 0,
            fired_in_transaction: false,
        }
    }

    /// Buffer `frame` and (re)schedule emission for `cost`.
    pub fn push(&mut self, frame: InboundFrame, cost: u32, now: Instant) {
        self.frames.push_back(frame);
        self.schedule(self.config.delay_for(cost), now);
    }

    /// Arm the timer for `delay`, or re-arm it if the delay changed.
    pub fn schedule(&mut self, delay: Duration, now: Instant) {
        match &mut self.timer {
            Some(timer) => {
                if timer.reschedule(delay, self.config.min_delay, now) {
                    log::trace!(
                        "slurp timer rescheduled: delay={delay:?}, deadline={:?}",
                        timer.deadline()
                    );
                }
            }
            None => self.timer = Some(EmissionTimer::arm(delay, now)),
        }
    }

    /// Instant at which the timer fires, if armed.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> { self.timer.map(|t| t.deadline()) }

    /// Consume the expired timer.
    pub fn fire(&mut self) -> Fire {
        self.timer = None;
        if self.transaction.is_some() {
            self.fired_in_transaction = true;
            Fire::Deferred
        } else {
            Fire::Emit
        }
    }

    /// Open a render transaction for the batch about to be emitted.
    pub fn begin_transaction(&mut self) -> TransactionId {
        let id = TransactionId(self.next_transaction);
        self.next_transaction += 1;
        self.transaction = Some(id);
        self.fired_in_transaction = false;
        id
    }

    /// Pop the head frame if it is complete.
    ///
    /// Returns `None` when the queue is empty or the head is still waiting
    /// on its image; the head and everything behind it stay buffered.
    pub fn pop_ready(&mut self) -> Option<InboundFrame> {
        if self.frames.front()?.is_complete() {
            self.frames.pop_front()
        } else {
            None
        }
    }

    /// Drop every buffered frame, returning how many were discarded.
    pub fn discard(&mut self) -> usize {
        let count = self.frames.len();
        self.frames.clear();
        count
    }

    /// Close transaction `id`. Returns `true` if emission was re-armed
    /// because the timer fired while it was open.
    pub fn end_transaction(&mut self, id: TransactionId, now: Instant) -> bool {
        if self.transaction != Some(id) {
            log::debug!("stale render transaction completed: id={}", id.0);
            return false;
        }
        self.transaction = None;
        if std::mem::take(&mut self.fired_in_transaction) {
            self.schedule(self.config.min_delay, now);
            return true;
        }
        false
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SlurpState {
        match (self.transaction, self.fired_in_transaction, self.timer) {
            (Some(_), true, _) => SlurpState::EmittingBlockedInTransaction,
            (Some(_), false, _) => SlurpState::Emitting,
            (None, _, Some(_)) => SlurpState::TimerArmed,
            (None, _, None) => SlurpState::Idle,
        }
    }

    /// Whether the head frame is waiting on its image.
    #[must_use]
    pub fn is_blocked(&self) -> bool { self.frames.front().is_some_and(|f| !f.is_complete()) }

    /// Number of buffered frames.
    #[must_use]
    pub fn len(&self) -> usize { self.frames.len() }

    /// Whether no frames are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.frames.is_empty() }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> SlurpConfig { self.config }
}

#[cfg(test)]
mod tests;
