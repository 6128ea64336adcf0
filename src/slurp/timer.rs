//! Emission timer bookkeeping.

use tokio::time::{Duration, Instant};

/// A single armed emission timer.
///
/// The launch instant survives re-arming so the total latency from the
/// first buffered frame stays bounded by the largest requested delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct EmissionTimer {
    launched_at: Instant,
    requested: Duration,
    deadline: Instant,
}

impl EmissionTimer {
    pub(super) fn arm(delay: Duration, now: Instant) -> Self {
        Self {
            launched_at: now,
            requested: delay,
            deadline: now + delay,
        }
    }

    /// Re-arm for a new requested delay, compensating for time already
    /// waited. Returns `false` when the delay is unchanged.
    pub(super) fn reschedule(&mut self, delay: Duration, floor: Duration, now: Instant) -> bool {
        if delay == self.requested {
            return false;
        }
        let waited = now.saturating_duration_since(self.launched_at);
        let remaining = delay.saturating_sub(waited).max(floor);
        self.requested = delay;
        self.deadline = now + remaining;
        true
    }

    pub(super) fn deadline(&self) -> Instant { self.deadline }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reschedule_subtracts_elapsed_time() {
        let start = Instant::now();
        let mut timer = EmissionTimer::arm(Duration::from_millis(50), start);
        let now = start + Duration::from_millis(5);
        assert!(timer.reschedule(Duration::from_millis(10), Duration::from_millis(1), now));
        assert_eq!(timer.deadline(), now + Duration::from_millis(5));
    }

    #[test]
    fn reschedule_never_goes_below_floor() {
        let start = Instant::now();
        let mut timer = EmissionTimer::arm(Duration::from_millis(50), start);
        let now = start + Duration::from_millis(30);
        assert!(timer.reschedule(Duration::from_millis(10), Duration::from_millis(1), now));
        assert_eq!(timer.deadline(), now + Duration::from_millis(1));
    }

    #[test]
    fn same_delay_keeps_deadline() {
        let start = Instant::now();
        let mut timer = EmissionTimer::arm(Duration::from_millis(20), start);
        let before = timer.deadline();
        assert!(!timer.reschedule(
            Duration::from_millis(20),
            Duration::from_millis(1),
            start + Duration::from_millis(3)
        ));
        assert_eq!(timer.deadline(), before);
    }
}
