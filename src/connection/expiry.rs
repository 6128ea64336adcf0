//! Access-token expiry warning.

use tokio::time::{Duration, Instant};

use crate::{strings, view::Notification};

/// How long before expiry the first warning fires.
pub const WARN_AHEAD: Duration = Duration::from_secs(15 * 60);
/// Interval between repeated warnings.
pub const REPEAT_EVERY: Duration = Duration::from_secs(120);

const MINUTE_MS: u64 = 60_000;

/// Timer warning the user that the access token is about to expire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiryWarning {
    expires_at_ms: u64,
    deadline: Instant,
}

impl ExpiryWarning {
    /// Arm the warning for a token expiring at `expires_at_ms`.
    ///
    /// A token that expires within [`WARN_AHEAD`], or already expired,
    /// warns immediately.
    #[must_use]
    pub fn arm(expires_at_ms: u64, now_ms: u64, now: Instant) -> Self {
        let remaining = Duration::from_millis(expires_at_ms.saturating_sub(now_ms));
        Self {
            expires_at_ms,
            deadline: now + remaining.saturating_sub(WARN_AHEAD),
        }
    }

    /// When the next warning fires.
    #[must_use]
    pub fn deadline(&self) -> Instant { self.deadline }

    /// Epoch milliseconds at which the token expires.
    #[must_use]
    pub fn expires_at_ms(&self) -> u64 { self.expires_at_ms }

    /// Produce the warning and re-arm for the next repeat.
    pub fn fire(&mut self, now_ms: u64, now: Instant) -> Notification {
        self.deadline = now + REPEAT_EVERY;
        let message = if now_ms >= self.expires_at_ms {
            strings::SESSION_EXPIRED.to_owned()
        } else {
            strings::SESSION_EXPIRY.replace("{time}", &utc_clock(self.expires_at_ms))
        };
        Notification::Warn { message }
    }
}

/// `HH:MM UTC` of an epoch timestamp.
fn utc_clock(epoch_ms: u64) -> String {
    let minutes = (epoch_ms / MINUTE_MS) % (24 * 60);
    format!("{:02}:{:02} UTC", minutes / 60, minutes % 60)
}
