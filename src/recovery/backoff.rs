//! Retry timing configuration and delay curves.

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::config::{millis, ms};

/// Timing of the recovery machinery.
///
/// # Default Values
/// - `unloading_base`: 500 ms, so retry *n* waits `500·n²` ms
/// - `unloading_max_attempts`: 10
/// - `jitter_min`..`jitter_max`: 5 s to 10 s for connection-lost loops
/// - `lost_first_delay`: 1 ms before the first reconnect after a drop
/// - `page_reload_delay`: 5 s before a forced reload on server change
/// - `document_reload_delay`: 3 s before reopening after conflict/rename
/// - `migration_reconnect_delay`: 2 s
/// - `wrong_server_reconnect_delay`: 3 s
/// - `wrong_server_max_attempts`: 3
///
/// # Invariants
/// - every delay is at least 1 ms
/// - `jitter_min < jitter_max`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Base of the quadratic document-unloading backoff.
    #[serde(deserialize_with = "millis::deserialize")]
    pub unloading_base: Duration,
    /// Scheduled unloading retries before giving up.
    pub unloading_max_attempts: u32,
    /// Lower bound (inclusive) of the reconnect jitter.
    #[serde(deserialize_with = "millis::deserialize")]
    pub jitter_min: Duration,
    /// Upper bound (exclusive) of the reconnect jitter.
    #[serde(deserialize_with = "millis::deserialize")]
    pub jitter_max: Duration,
    /// Delay before the first reconnect after an unexpected close.
    #[serde(deserialize_with = "millis::deserialize")]
    pub lost_first_delay: Duration,
    /// Delay before reloading the page after the server changed.
    #[serde(deserialize_with = "millis::deserialize")]
    pub page_reload_delay: Duration,
    /// Delay before reopening the document after conflict, version
    /// restore or rename.
    #[serde(deserialize_with = "millis::deserialize")]
    pub document_reload_delay: Duration,
    /// Delay before reconnecting to a migrated document.
    #[serde(deserialize_with = "millis::deserialize")]
    pub migration_reconnect_delay: Duration,
    /// Delay before reconnecting after reaching the wrong cluster node.
    #[serde(deserialize_with = "millis::deserialize")]
    pub wrong_server_reconnect_delay: Duration,
    /// Wrong-node reconnects tolerated before giving up.
    pub wrong_server_max_attempts: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            unloading_base: ms(500),
            unloading_max_attempts: 10,
            jitter_min: ms(5000),
            jitter_max: ms(10_000),
            lost_first_delay: ms(1),
            page_reload_delay: ms(5000),
            document_reload_delay: ms(3000),
            migration_reconnect_delay: ms(2000),
            wrong_server_reconnect_delay: ms(3000),
            wrong_server_max_attempts: 3,
        }
    }
}

impl RecoveryConfig {
    /// Clamp delays to at least 1 ms and keep the jitter range non-empty.
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use docwire::recovery::RecoveryConfig;
    ///
    /// let cfg = RecoveryConfig {
    ///     jitter_min: Duration::from_secs(10),
    ///     jitter_max: Duration::from_secs(5),
    ///     ..RecoveryConfig::default()
    /// }
    /// .normalized();
    /// assert_eq!(cfg.jitter_min, Duration::from_secs(5));
    /// assert_eq!(cfg.jitter_max, Duration::from_secs(10));
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let floor = ms(1);
        for delay in [
            &mut self.unloading_base,
            &mut self.jitter_min,
            &mut self.jitter_max,
            &mut self.lost_first_delay,
            &mut self.page_reload_delay,
            &mut self.document_reload_delay,
            &mut self.migration_reconnect_delay,
            &mut self.wrong_server_reconnect_delay,
        ] {
            *delay = (*delay).max(floor);
        }
        if self.jitter_min > self.jitter_max {
            std::mem::swap(&mut self.jitter_min, &mut self.jitter_max);
        }
        if self.jitter_min == self.jitter_max {
            self.jitter_max += floor;
        }
        self
    }
}

/// Delay before document-unloading retry number `attempt` (1-based).
///
/// ```
/// use std::time::Duration;
///
/// use docwire::recovery::unloading_delay;
///
/// let base = Duration::from_millis(500);
/// assert_eq!(unloading_delay(base, 1), Duration::from_millis(500));
/// assert_eq!(unloading_delay(base, 3), Duration::from_millis(4500));
/// ```
#[must_use]
pub fn unloading_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt.saturating_mul(attempt))
}

/// Uniform delay in `[min, max)`, at millisecond resolution.
pub fn jitter<R: Rng + ?Sized>(rng: &mut R, min: Duration, max: Duration) -> Duration {
    let low = u64::try_from(min.as_millis()).unwrap_or(u64::MAX);
    let high = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if low >= high {
        return min;
    }
    Duration::from_millis(rng.gen_range(low..high))
}
