//! Per-frame failure isolation.
//!
//! A handler that returns an error or panics must not take the rest of the
//! batch down with it. The failure is logged with the offending frame and
//! counted; in debug sessions it is also surfaced to the user.

use std::{
    any::Any,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
};

use log::{debug, error};

use super::Flow;
use crate::{
    actor::SessionActor,
    frame::{InboundFrame, loggable},
    metrics,
    view::{Notification, View},
};

/// Wrapper that formats a panic payload when logged or displayed.
///
/// ```
/// use docwire::dispatch::format_panic;
///
/// assert_eq!(format_panic(Box::new("boom")).to_string(), "boom");
/// assert_eq!(format_panic(Box::new(String::from("bang"))).to_string(), "bang");
/// assert_eq!(format_panic(Box::new(7_u8)).to_string(), "non-string panic payload");
/// ```
#[must_use]
pub struct PanicMessage(Box<dyn Any + Send>);

impl fmt::Debug for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PanicMessage").field(&self.to_string()).finish()
    }
}

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            f.write_str("non-string panic payload")
        }
    }
}

/// Create a [`PanicMessage`] for the given payload.
pub fn format_panic(panic: Box<dyn Any + Send>) -> PanicMessage { PanicMessage(panic) }

impl<V: View> SessionActor<V> {
    /// Dispatch `frame`, containing any handler failure.
    ///
    /// A failed frame counts as consumed so the batch carries on.
    pub(crate) fn dispatch_isolated(&mut self, frame: &InboundFrame) -> Flow {
        let text = frame.message_text();
        if self.config.debug {
            debug!("incoming: {text}");
        } else {
            debug!("incoming: {}", loggable(&text, self.config.log_frame_limit));
        }
        match catch_unwind(AssertUnwindSafe(|| self.dispatch(&text, frame))) {
            Ok(Ok(flow)) => flow,
            Ok(Err(e)) => {
                self.handler_failed(&text, &e.to_string());
                Flow::Consumed
            }
            Err(panic) => {
                let panic = format_panic(panic);
                self.handler_failed(&text, &panic.to_string());
                Flow::Consumed
            }
        }
    }

    fn handler_failed(&mut self, text: &str, reason: &str) {
        metrics::inc_handler_failures();
        let shown = loggable(text, self.config.log_frame_limit);
        error!("frame handler failed: error={reason}, frame={shown}");
        if self.config.debug {
            self.view.notify(Notification::Modal {
                id: "cool_alert".to_owned(),
                title: "Error".to_owned(),
                message: format!("{reason}\n{shown}"),
            });
        }
    }
}
